//! Shared problems for the end-to-end tests.

pub mod problems;
