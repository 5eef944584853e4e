//! Direct-collocation transcription and NLP solvers.
//!
//! - [`direct_collocation`] — transcribes a [`Problem`] into an NLP on a
//!   mesh, solves it, and decodes the result into a trajectory
//! - [`nlp`] — the NLP contract, finite-difference derivatives, sparsity
//!   patterns, and the built-in augmented-Lagrangian backend
//!
//! [`Problem`]: colloc_core::Problem

pub mod direct_collocation;
pub mod nlp;
