/// A concrete trajectory laid out on a transcription's grid.
///
/// Time-varying values are stored point-major: `states[k][i]` is state `i`
/// at grid point `k`. The number of grid points depends on the mesh and the
/// transcription scheme, so an iterate built for one scheme or mesh is not
/// layout-compatible with another; use [`Iterate::resample`] to move it onto
/// a different grid.
///
/// `derivatives` is empty at every point unless the problem is in implicit
/// mode.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Iterate {
    pub initial_time: f64,
    pub final_time: f64,
    pub times: Vec<f64>,

    pub state_names: Vec<String>,
    pub control_names: Vec<String>,
    pub multiplier_names: Vec<String>,
    pub derivative_names: Vec<String>,
    pub parameter_names: Vec<String>,

    pub states: Vec<Vec<f64>>,
    pub controls: Vec<Vec<f64>>,
    pub multipliers: Vec<Vec<f64>>,
    pub derivatives: Vec<Vec<f64>>,
    pub parameters: Vec<f64>,
}

impl Iterate {
    /// Returns the number of grid points.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.times.len()
    }

    /// Returns the trajectory of the named state.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<Vec<f64>> {
        column(&self.state_names, &self.states, name)
    }

    /// Returns the trajectory of the named control.
    #[must_use]
    pub fn control(&self, name: &str) -> Option<Vec<f64>> {
        column(&self.control_names, &self.controls, name)
    }

    /// Returns the trajectory of the named multiplier.
    #[must_use]
    pub fn multiplier(&self, name: &str) -> Option<Vec<f64>> {
        column(&self.multiplier_names, &self.multipliers, name)
    }

    /// Returns the trajectory of the named derivative variable.
    #[must_use]
    pub fn derivative(&self, name: &str) -> Option<Vec<f64>> {
        column(&self.derivative_names, &self.derivatives, name)
    }

    /// Returns the value of the named parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<f64> {
        let index = self.parameter_names.iter().position(|n| n == name)?;
        self.parameters.get(index).copied()
    }

    /// Returns the normalized position of every grid point in `[0, 1]`.
    ///
    /// A zero-length horizon is treated as uniformly spaced.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn normalized_times(&self) -> Vec<f64> {
        let duration = self.final_time - self.initial_time;
        let n = self.times.len();
        if duration.abs() > 0.0 {
            self.times
                .iter()
                .map(|t| (t - self.initial_time) / duration)
                .collect()
        } else if n > 1 {
            let last = (n - 1) as f64;
            (0..n).map(|i| i as f64 / last).collect()
        } else {
            vec![0.0; n]
        }
    }

    /// Linearly interpolates every trajectory onto a new normalized grid.
    ///
    /// The initial and final time are kept; values outside the current
    /// grid are held at the nearest endpoint.
    ///
    /// # Panics
    ///
    /// Panics if `times` is empty or a trajectory has a different point
    /// count than `times`.
    #[must_use]
    pub fn resample(&self, grid: &[f64]) -> Self {
        let from = self.normalized_times();
        let duration = self.final_time - self.initial_time;

        let resample_rows = |rows: &Vec<Vec<f64>>| -> Vec<Vec<f64>> {
            let width = rows.first().map_or(0, Vec::len);
            grid.iter()
                .map(|&tau| {
                    (0..width)
                        .map(|i| interpolate(&from, rows, i, tau))
                        .collect()
                })
                .collect()
        };

        Self {
            initial_time: self.initial_time,
            final_time: self.final_time,
            times: grid
                .iter()
                .map(|tau| self.initial_time + tau * duration)
                .collect(),
            state_names: self.state_names.clone(),
            control_names: self.control_names.clone(),
            multiplier_names: self.multiplier_names.clone(),
            derivative_names: self.derivative_names.clone(),
            parameter_names: self.parameter_names.clone(),
            states: resample_rows(&self.states),
            controls: resample_rows(&self.controls),
            multipliers: resample_rows(&self.multipliers),
            derivatives: resample_rows(&self.derivatives),
            parameters: self.parameters.clone(),
        }
    }
}

fn column(names: &[String], rows: &[Vec<f64>], name: &str) -> Option<Vec<f64>> {
    let index = names.iter().position(|n| n == name)?;
    rows.iter().map(|row| row.get(index).copied()).collect()
}

/// Piecewise-linear interpolation of column `i` of `rows` at `x`.
fn interpolate(xs: &[f64], rows: &[Vec<f64>], i: usize, x: f64) -> f64 {
    let n = xs.len();
    if n == 1 || x <= xs[0] {
        return rows[0][i];
    }
    if x >= xs[n - 1] {
        return rows[n - 1][i];
    }

    // First index whose abscissa exceeds x, kept in 1..n for unsorted or
    // NaN times.
    let upper = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (rows[upper - 1][i], rows[upper][i]);
    if x1 == x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
