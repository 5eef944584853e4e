//! Core traits and types for direct-collocation optimal control.
//!
//! This crate defines the shared abstractions that the transcription, the
//! NLP backend, and observers build on:
//!
//! - [`Problem`] — the continuous-time optimal-control problem: variables,
//!   bounds, dynamics, costs, and constraints
//! - [`Bounds`] — a validated `[lower, upper]` range for a scalar quantity
//! - [`Mesh`] — the normalized time grid collocation is applied on
//! - [`Iterate`] — a time-indexed trajectory consistent with a transcription
//! - [`Observer`] — receives solver events and optionally returns control actions
//! - [`cost`] — weighted integral and endpoint cost terms

mod bounds;
pub mod cost;
mod iterate;
mod mesh;
mod observer;
mod problem;

pub use bounds::{Bounds, BoundsError};
pub use iterate::Iterate;
pub use mesh::{Mesh, MeshError};
pub use observer::Observer;
pub use problem::{
    Constraint, Derivative, DerivativeKind, Dynamics, DynamicsMode, Problem, TimePoint, Variable,
};
