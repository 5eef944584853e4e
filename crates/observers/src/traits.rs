//! Capability traits for cross-solver observers.
//!
//! These traits abstract over solver-specific event and action types, enabling
//! observers to work generically across the NLP backend and the direct
//! collocation solver.
//!
//! # Event traits
//!
//! - [`HasIteration`] — events numbered by solver iteration
//! - [`HasObjective`] — events that carry an objective value
//! - [`HasInfeasibility`] — events that carry a constraint violation
//!
//! # Action traits
//!
//! - [`CanStopEarly`] — actions that can signal early termination
//!
//! # Example
//!
//! ```rust
//! use colloc_core::Observer;
//! use colloc_observers::traits::{CanStopEarly, HasInfeasibility, HasObjective};
//!
//! struct GoodEnough {
//!     objective: f64,
//!     tolerance: f64,
//! }
//!
//! impl<E: HasObjective + HasInfeasibility, A: CanStopEarly> Observer<E, A> for GoodEnough {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         if event.infeasibility() < self.tolerance && event.objective() < self.objective {
//!             return Some(A::stop_early());
//!         }
//!         None
//!     }
//! }
//! ```

use colloc_solvers::{direct_collocation, nlp::auglag};

/// An event numbered by solver iteration.
pub trait HasIteration {
    /// Returns the one-based iteration count of this event.
    fn iteration(&self) -> usize;
}

/// An event that carries an objective value.
pub trait HasObjective {
    fn objective(&self) -> f64;
}

/// An event that carries the largest constraint violation.
pub trait HasInfeasibility {
    fn infeasibility(&self) -> f64;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the solver early.
    fn stop_early() -> Self;
}

// --- auglag ---

impl HasIteration for auglag::Event<'_> {
    fn iteration(&self) -> usize {
        self.iteration
    }
}

impl HasObjective for auglag::Event<'_> {
    fn objective(&self) -> f64 {
        self.objective
    }
}

impl HasInfeasibility for auglag::Event<'_> {
    fn infeasibility(&self) -> f64 {
        self.infeasibility
    }
}

impl CanStopEarly for auglag::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

// --- direct_collocation ---

impl HasIteration for direct_collocation::Event<'_> {
    fn iteration(&self) -> usize {
        self.iteration
    }
}

impl HasObjective for direct_collocation::Event<'_> {
    fn objective(&self) -> f64 {
        self.objective
    }
}

impl HasInfeasibility for direct_collocation::Event<'_> {
    fn infeasibility(&self) -> f64 {
        self.infeasibility
    }
}

impl CanStopEarly for direct_collocation::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}
