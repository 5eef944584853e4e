//! Nonlinear programs and the solvers that accept them.
//!
//! An [`Nlp`] is a finite-dimensional problem
//!
//! ```text
//! minimize    f(x)
//! subject to  gL <= g(x) <= gU
//!             xL <= x <= xU
//! ```
//!
//! Backends only evaluate `f` and `g`. First derivatives are computed by
//! finite differences ([`FiniteDifference`]) guided by sparsity patterns
//! ([`Pattern`]), which are either declared by the caller or detected by
//! perturbation.
//!
//! # Backends
//!
//! - [`auglag`] — augmented Lagrangian with a projected-Newton inner solver
//!
//! [`OptimSolver`] selects a backend by name and dispatches to it.

mod backend;
mod finite_diff;
mod options;
mod problem;
mod sparsity;
mod status;

pub mod auglag;

pub use backend::{OptimSolver, PluginOptions};
pub use finite_diff::{Derivatives, Differentiator, FiniteDifference};
pub use options::{OptionValue, Options, OptionsError};
pub use problem::{EvalError, Nlp};
pub use sparsity::{Pattern, detect};
pub use status::Status;
