use crate::nlp::EvalError;

/// Errors that can occur during an augmented Lagrangian solve.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("evaluation error: {0}")]
    Evaluation(EvalError),

    #[error("initial point has {actual} variables, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("the initial point does not evaluate to finite values")]
    NonFinite,
}
