/// Progress reported after each outer iteration.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// One-based outer iteration count.
    pub iteration: usize,

    /// The current iterate.
    pub x: &'a [f64],

    pub objective: f64,

    /// Largest distance of any constraint row from its bounds.
    pub infeasibility: f64,

    /// Projected gradient norm of the Lagrangian.
    pub optimality: f64,

    /// Penalty parameter used for the iteration.
    pub penalty: f64,
}
