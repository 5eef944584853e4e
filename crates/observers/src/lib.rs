//! Reusable observers for direct-collocation solves.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work across the solvers in `colloc-solvers`.
//!
//! # Modules
//!
//! - [`traits`] — Capability traits for cross-solver observers
//!   ([`HasIteration`], [`HasObjective`], [`HasInfeasibility`], [`CanStopEarly`])
//! - [`ProgressLogger`] — logs every observed event through the `log` facade
//!
//! [`Observer`]: colloc_core::Observer
//! [`HasIteration`]: traits::HasIteration
//! [`HasObjective`]: traits::HasObjective
//! [`HasInfeasibility`]: traits::HasInfeasibility
//! [`CanStopEarly`]: traits::CanStopEarly

mod logger;
pub mod traits;

pub use logger::ProgressLogger;
