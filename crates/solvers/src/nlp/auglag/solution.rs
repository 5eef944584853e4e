use crate::nlp::Status;

/// The result of an augmented Lagrangian solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Final solver status.
    pub status: Status,

    /// The final iterate.
    pub x: Vec<f64>,

    /// Multiplier estimate of every constraint row.
    pub multipliers: Vec<f64>,

    /// Objective at `x`.
    pub objective: f64,

    /// Largest constraint violation at `x`.
    pub infeasibility: f64,

    /// Projected gradient norm of the Lagrangian at `x`.
    pub optimality: f64,

    /// Outer iteration count when the solver finished.
    pub iterations: usize,

    /// Total inner iterations across all outer iterations.
    pub inner_iterations: usize,

    pub objective_evaluations: usize,
    pub constraint_evaluations: usize,
}
