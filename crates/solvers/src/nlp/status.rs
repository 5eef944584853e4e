/// Indicates how an NLP solve terminated.
///
/// Every status other than [`Status::Converged`] still carries a meaningful
/// (partial) point, so callers can inspect it and retry with adjusted
/// settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Converged according to the configured tolerances.
    Converged,

    /// Reached the iteration limit without converging.
    MaxIterations,

    /// The penalty ceiling was reached while constraints remained violated.
    Infeasible,

    /// Stopped early due to an observer decision.
    StoppedByObserver,

    /// No descent direction or step could be computed.
    NumericalFailure,
}

impl Status {
    /// Returns `true` for [`Status::Converged`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converged)
    }
}
