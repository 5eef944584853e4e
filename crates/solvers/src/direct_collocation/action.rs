/// Actions an observer can take during a direct collocation solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the solve and return the current iterate.
    StopEarly,
}
