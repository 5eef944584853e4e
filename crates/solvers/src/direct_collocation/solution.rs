use std::time::Duration;

use colloc_core::Iterate;

pub use crate::nlp::Status;

use super::SparsityDetection;

/// How the derivative structure of a solve was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparsityReport {
    pub detection: SparsityDetection,

    /// Number of points the pattern was detected at; 0 for the block pattern.
    pub samples: usize,

    pub jacobian_nonzeros: usize,
    pub gradient_nonzeros: usize,

    /// Column groups perturbed together for each Jacobian.
    pub jacobian_colors: usize,
}

/// The result of a direct collocation solve.
///
/// A solution is returned for every backend status; check
/// [`Solution::is_success`] before relying on the trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: Status,

    /// The final point, decoded onto the grid.
    pub iterate: Iterate,

    pub objective: f64,
    pub infeasibility: f64,
    pub optimality: f64,

    /// Multiplier estimate of every constraint row, in transcription order.
    pub constraint_multipliers: Vec<f64>,

    pub iterations: usize,
    pub objective_evaluations: usize,
    pub constraint_evaluations: usize,

    /// Wall time spent in the backend.
    pub solve_time: Duration,

    pub sparsity: SparsityReport,
}

impl Solution {
    /// Returns `true` if the backend converged.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
