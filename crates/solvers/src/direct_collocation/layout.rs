use std::ops::Range;

use colloc_core::{Bounds, Derivative, DerivativeKind, DynamicsMode, Mesh, Problem};

use super::{Scheme, Settings};

/// Where the initial or final time lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum TimeSlot {
    /// Pinned by bounds with `lower == upper`; not a decision variable.
    Fixed(f64),

    /// Decision variable at this index.
    Free(usize),
}

impl TimeSlot {
    pub fn value(self, x: &[f64]) -> f64 {
        match self {
            Self::Fixed(t) => t,
            Self::Free(j) => x[j],
        }
    }
}

/// Index arithmetic for the decision vector and the constraint rows.
///
/// Variables are ordered `[t0?][tf?]`, then one block per grid point
/// (states, controls, multipliers, derivatives), then parameters.
///
/// Rows are ordered: defects per interval, implicit residuals per grid
/// point, midpoint control interpolation per interval, path constraints
/// per mesh point, boundary constraints.
#[derive(Debug, Clone)]
pub(super) struct Layout {
    pub scheme: Scheme,
    pub mesh: Mesh,

    /// Normalized time of every grid point.
    pub grid: Vec<f64>,

    /// Normalized quadrature weight of every grid point.
    pub weights: Vec<f64>,

    pub initial_time: TimeSlot,
    pub final_time: TimeSlot,

    pub num_states: usize,
    pub num_controls: usize,
    pub num_multipliers: usize,

    /// Zero in explicit mode.
    pub num_derivatives: usize,
    pub num_parameters: usize,
    pub num_path: usize,
    pub num_boundary: usize,

    pub interpolate_controls: bool,

    pub variable_bounds: Vec<Bounds>,
    pub constraint_bounds: Vec<Bounds>,
    variable_names: Vec<String>,
}

impl Layout {
    pub fn new<P: Problem>(problem: &P, scheme: Scheme, mesh: &Mesh, settings: &Settings) -> Self {
        let implicit = problem.dynamics_mode() == DynamicsMode::Implicit;
        let derivatives: &[Derivative] = if implicit { problem.derivatives() } else { &[] };

        let grid = scheme.grid(mesh);
        let num_points = grid.len();

        let mut variable_bounds = Vec::new();
        let mut variable_names = Vec::new();

        let mut time_slot = |name: &str, bounds: Bounds| {
            if bounds.is_fixed() {
                TimeSlot::Fixed(bounds.lower())
            } else {
                variable_bounds.push(bounds);
                variable_names.push(name.to_owned());
                TimeSlot::Free(variable_bounds.len() - 1)
            }
        };
        let initial_time = time_slot("initial_time", problem.initial_time_bounds());
        let final_time = time_slot("final_time", problem.final_time_bounds());

        for k in 0..num_points {
            let first = k == 0;
            let last = k + 1 == num_points;
            let trajectories = [problem.states(), problem.controls(), problem.multipliers()];
            for variable in trajectories.into_iter().flatten() {
                let bounds = match (first, last) {
                    (true, _) => variable.initial_bounds.unwrap_or(variable.bounds),
                    (_, true) => variable.final_bounds.unwrap_or(variable.bounds),
                    _ => variable.bounds,
                };
                variable_bounds.push(bounds);
                variable_names.push(format!("{}[{k}]", variable.name));
            }
            for derivative in derivatives {
                variable_bounds.push(match derivative.kind {
                    DerivativeKind::Acceleration => settings.implicit_mode_acceleration_bounds,
                    DerivativeKind::ComponentDerivative => {
                        settings.implicit_component_derivative_bounds
                    }
                });
                variable_names.push(format!("{}[{k}]", derivative.name));
            }
        }
        for parameter in problem.parameters() {
            variable_bounds.push(parameter.bounds);
            variable_names.push(parameter.name.clone());
        }

        let mut layout = Self {
            scheme,
            mesh: mesh.clone(),
            weights: scheme.quadrature_weights(mesh),
            grid,
            initial_time,
            final_time,
            num_states: problem.states().len(),
            num_controls: problem.controls().len(),
            num_multipliers: problem.multipliers().len(),
            num_derivatives: derivatives.len(),
            num_parameters: problem.parameters().len(),
            num_path: problem.path_constraints().len(),
            num_boundary: problem.boundary_constraints().len(),
            interpolate_controls: scheme.has_midpoints() && settings.interpolate_control_midpoints,
            variable_bounds,
            constraint_bounds: Vec::new(),
            variable_names,
        };

        let mut rows = vec![Bounds::ZERO; layout.path_start()];
        for _ in 0..mesh.num_points() {
            rows.extend(problem.path_constraints().iter().map(|c| c.bounds));
        }
        rows.extend(problem.boundary_constraints().iter().map(|c| c.bounds));
        layout.constraint_bounds = rows;

        layout
    }

    pub fn num_points(&self) -> usize {
        self.grid.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variable_bounds.len()
    }

    /// Variables in one grid point's block.
    pub fn stride(&self) -> usize {
        self.num_states + self.num_controls + self.num_multipliers + self.num_derivatives
    }

    fn first_point(&self) -> usize {
        usize::from(matches!(self.initial_time, TimeSlot::Free(_)))
            + usize::from(matches!(self.final_time, TimeSlot::Free(_)))
    }

    /// Every variable of grid point `k`.
    pub fn point(&self, k: usize) -> Range<usize> {
        let start = self.first_point() + k * self.stride();
        start..start + self.stride()
    }

    pub fn states(&self, k: usize) -> Range<usize> {
        let start = self.point(k).start;
        start..start + self.num_states
    }

    pub fn controls(&self, k: usize) -> Range<usize> {
        let start = self.states(k).end;
        start..start + self.num_controls
    }

    pub fn multipliers(&self, k: usize) -> Range<usize> {
        let start = self.controls(k).end;
        start..start + self.num_multipliers
    }

    pub fn derivatives(&self, k: usize) -> Range<usize> {
        let start = self.multipliers(k).end;
        start..start + self.num_derivatives
    }

    pub fn parameters(&self) -> Range<usize> {
        let start = self.first_point() + self.num_points() * self.stride();
        start..start + self.num_parameters
    }

    /// Free time columns.
    pub fn time_columns(&self) -> Vec<usize> {
        [self.initial_time, self.final_time]
            .into_iter()
            .filter_map(|slot| match slot {
                TimeSlot::Fixed(_) => None,
                TimeSlot::Free(j) => Some(j),
            })
            .collect()
    }

    /// Returns `(t0, tf)` for a decision vector.
    pub fn horizon(&self, x: &[f64]) -> (f64, f64) {
        (self.initial_time.value(x), self.final_time.value(x))
    }

    /// Time of grid point `k` on the horizon `[t0, tf]`.
    pub fn time(&self, k: usize, (t0, tf): (f64, f64)) -> f64 {
        t0 + self.grid[k] * (tf - t0)
    }

    pub fn variable_name(&self, j: usize) -> &str {
        &self.variable_names[j]
    }

    /// Defect rows per mesh interval.
    pub fn defects_per_interval(&self) -> usize {
        if self.scheme.has_midpoints() {
            2 * self.num_states
        } else {
            self.num_states
        }
    }

    pub fn residual_start(&self) -> usize {
        self.mesh.num_intervals() * self.defects_per_interval()
    }

    pub fn interpolation_start(&self) -> usize {
        self.residual_start() + self.num_points() * self.num_derivatives
    }

    pub fn path_start(&self) -> usize {
        let interpolation_rows = if self.interpolate_controls {
            self.mesh.num_intervals() * self.num_controls
        } else {
            0
        };
        self.interpolation_start() + interpolation_rows
    }

    pub fn boundary_start(&self) -> usize {
        self.path_start() + self.mesh.num_points() * self.num_path
    }

    pub fn num_constraints(&self) -> usize {
        self.boundary_start() + self.num_boundary
    }
}
