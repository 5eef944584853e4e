use colloc_core::Iterate;

/// Progress reported every `callback_interval` backend iterations.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// One-based backend iteration count.
    pub iteration: usize,

    pub objective: f64,

    /// Largest distance of any constraint row from its bounds.
    pub infeasibility: f64,

    pub optimality: f64,

    /// The backend's current point, decoded onto the grid.
    pub iterate: &'a Iterate,
}
