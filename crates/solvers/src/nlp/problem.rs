use std::error::Error as StdError;

use colloc_core::Bounds;

/// A failure reported while evaluating an [`Nlp`] function.
pub type EvalError = Box<dyn StdError + Send + Sync>;

/// Defines a nonlinear program for a derivative-based backend.
///
/// The variable and constraint counts are implied by the bounds slices.
/// Implementations must be deterministic: evaluating the same `x` twice
/// must produce bitwise-identical results, which sparsity detection relies
/// on.
pub trait Nlp {
    /// Bounds of every decision variable.
    fn variable_bounds(&self) -> &[Bounds];

    /// Bounds of every constraint row.
    fn constraint_bounds(&self) -> &[Bounds];

    /// Evaluates the objective.
    ///
    /// # Errors
    ///
    /// Returns an error if the objective cannot be evaluated at `x`.
    fn objective(&self, x: &[f64]) -> Result<f64, EvalError>;

    /// Evaluates every constraint row into `g`.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraints cannot be evaluated at `x`.
    fn constraints(&self, x: &[f64], g: &mut [f64]) -> Result<(), EvalError>;

    fn num_variables(&self) -> usize {
        self.variable_bounds().len()
    }

    fn num_constraints(&self) -> usize {
        self.constraint_bounds().len()
    }
}
