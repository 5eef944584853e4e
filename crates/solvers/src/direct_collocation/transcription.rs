use std::{error::Error as StdError, ops::Range};

use colloc_core::{Bounds, Dynamics, DynamicsMode, Iterate, Problem, TimePoint, Variable};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::nlp::{Derivatives, EvalError, Nlp, Pattern, detect};

use super::{
    ConfigError, Error, EvaluationError, Function, Parallelism, Scheme, Settings,
    SparsityDetection, SparsityReport, guess,
    layout::{Layout, TimeSlot},
};

/// A problem transcribed onto a mesh by a collocation scheme.
///
/// The transcription is an [`Nlp`] over the decision vector described by
/// its layout, and converts between decision vectors and [`Iterate`]s.
/// Per-point evaluations of the dynamics, the integrand, and the path
/// constraints run on a thread pool when one is configured.
pub struct Transcription<'p, P> {
    problem: &'p P,
    layout: Layout,
    multiplier_weight: Option<f64>,
    pool: Option<ThreadPool>,
}

impl<'p, P: Problem> Transcription<'p, P> {
    /// Transcribes `problem` with the scheme and mesh in `settings`.
    ///
    /// Evaluation is serial until [`Transcription::with_parallelism`] is
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme name is unknown or no mesh is set.
    pub fn new(problem: &'p P, settings: &Settings) -> Result<Self, Error> {
        let scheme: Scheme = settings
            .transcription_scheme
            .parse()
            .map_err(|name| Error::UnsupportedScheme { name })?;
        let mesh = settings.mesh.as_ref().ok_or(ConfigError::MissingMesh)?;

        let layout = Layout::new(problem, scheme, mesh, settings);
        if problem.dynamics_mode() == DynamicsMode::Explicit {
            let defaults = Settings::default();
            if settings.implicit_mode_acceleration_bounds
                != defaults.implicit_mode_acceleration_bounds
                || settings.implicit_component_derivative_bounds
                    != defaults.implicit_component_derivative_bounds
            {
                debug!("explicit dynamics, ignoring implicit-mode derivative bounds");
            }
        }

        Ok(Self {
            problem,
            layout,
            multiplier_weight: settings
                .minimize_lagrange_multipliers
                .then_some(settings.lagrange_multiplier_weight),
            pool: None,
        })
    }

    /// Schedules per-point evaluations according to `parallelism`.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero thread count or if the pool cannot be
    /// built.
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Result<Self, Error> {
        parallelism.validate()?;
        self.pool = match parallelism {
            Parallelism::Serial => None,
            Parallelism::Thread { num_threads } => Some(
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()?,
            ),
        };
        Ok(self)
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.layout.scheme
    }

    /// Number of grid points carrying trajectory variables.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.layout.num_points()
    }

    /// Normalized time of every grid point.
    #[must_use]
    pub fn grid(&self) -> &[f64] {
        &self.layout.grid
    }

    /// Describes decision variable `j`, for example `"x[3]"`.
    #[must_use]
    pub fn variable_name(&self, j: usize) -> &str {
        self.layout.variable_name(j)
    }

    /// Converts a decision vector into an iterate.
    ///
    /// # Panics
    ///
    /// Panics if `x` is shorter than the number of decision variables.
    #[must_use]
    pub fn decode(&self, x: &[f64]) -> Iterate {
        let layout = &self.layout;
        let (t0, tf) = layout.horizon(x);
        let rows = |range: fn(&Layout, usize) -> Range<usize>| -> Vec<Vec<f64>> {
            (0..layout.num_points())
                .map(|k| x[range(layout, k)].to_vec())
                .collect()
        };
        let names = |variables: &[Variable]| -> Vec<String> {
            variables.iter().map(|v| v.name.clone()).collect()
        };

        let derivative_names = if layout.num_derivatives > 0 {
            self.problem
                .derivatives()
                .iter()
                .map(|d| d.name.clone())
                .collect()
        } else {
            Vec::new()
        };

        Iterate {
            initial_time: t0,
            final_time: tf,
            times: (0..layout.num_points())
                .map(|k| layout.time(k, (t0, tf)))
                .collect(),
            state_names: names(self.problem.states()),
            control_names: names(self.problem.controls()),
            multiplier_names: names(self.problem.multipliers()),
            derivative_names,
            parameter_names: names(self.problem.parameters()),
            states: rows(Layout::states),
            controls: rows(Layout::controls),
            multipliers: rows(Layout::multipliers),
            derivatives: rows(Layout::derivatives),
            parameters: x[layout.parameters()].to_vec(),
        }
    }

    /// Converts an iterate into a decision vector.
    ///
    /// Fixed initial and final times are not part of the vector, so the
    /// iterate's values for them are ignored. Trajectories whose width is
    /// zero may be given as an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IterateShape`] if the iterate was built for a
    /// different grid or problem.
    pub fn encode(&self, iterate: &Iterate) -> Result<Vec<f64>, ConfigError> {
        let layout = &self.layout;
        let n = layout.num_points();

        check_len("times", n, iterate.times.len())?;
        check_rows("states", &iterate.states, n, layout.num_states)?;
        check_rows("controls", &iterate.controls, n, layout.num_controls)?;
        check_rows("multipliers", &iterate.multipliers, n, layout.num_multipliers)?;
        check_rows("derivatives", &iterate.derivatives, n, layout.num_derivatives)?;
        check_len("parameters", layout.num_parameters, iterate.parameters.len())?;

        let mut x = vec![0.0; layout.num_variables()];
        if let TimeSlot::Free(j) = layout.initial_time {
            x[j] = iterate.initial_time;
        }
        if let TimeSlot::Free(j) = layout.final_time {
            x[j] = iterate.final_time;
        }

        let blocks: [(fn(&Layout, usize) -> Range<usize>, &Vec<Vec<f64>>); 4] = [
            (Layout::states, &iterate.states),
            (Layout::controls, &iterate.controls),
            (Layout::multipliers, &iterate.multipliers),
            (Layout::derivatives, &iterate.derivatives),
        ];
        for (range, rows) in blocks {
            for (k, row) in rows.iter().enumerate() {
                x[range(layout, k)].copy_from_slice(row);
            }
        }
        x[layout.parameters()].copy_from_slice(&iterate.parameters);

        Ok(x)
    }

    /// Checks that `iterate` fits this problem on its own grid.
    ///
    /// Unlike [`Transcription::encode`], the point count may differ from
    /// this transcription's grid, but every trajectory must have one row per
    /// time of the iterate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyIterate`] for an iterate without points,
    /// or [`ConfigError::IterateShape`] for mismatched rows or widths.
    pub fn check_widths(&self, iterate: &Iterate) -> Result<(), ConfigError> {
        let layout = &self.layout;
        let n = iterate.times.len();
        if n == 0 {
            return Err(ConfigError::EmptyIterate);
        }

        check_rows("states", &iterate.states, n, layout.num_states)?;
        check_rows("controls", &iterate.controls, n, layout.num_controls)?;
        check_rows("multipliers", &iterate.multipliers, n, layout.num_multipliers)?;
        check_rows("derivatives", &iterate.derivatives, n, layout.num_derivatives)?;
        check_len("parameters", layout.num_parameters, iterate.parameters.len())
    }

    /// The iterate at the midpoint guess of every variable's bounds.
    #[must_use]
    pub fn initial_guess_from_bounds(&self) -> Iterate {
        self.decode(&guess::from_bounds(&self.layout))
    }

    /// An iterate drawn uniformly within every variable's bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InfiniteBounds`] if any bound is infinite.
    pub fn random_iterate<R: Rng>(&self, rng: &mut R) -> Result<Iterate, ConfigError> {
        guess::random_within_bounds(&self.layout, rng).map(|x| self.decode(&x))
    }

    /// The constraint Jacobian structure implied by the layout.
    ///
    /// Every per-point function is assumed to depend on all variables of
    /// its point, and on the free times and parameters. Midpoint control
    /// interpolation rows are exact.
    #[must_use]
    pub fn block_pattern(&self) -> Pattern {
        let layout = &self.layout;
        let shared: Vec<usize> = layout
            .time_columns()
            .into_iter()
            .chain(layout.parameters())
            .collect();

        let mut entries = Vec::new();
        let mut block = |rows: Range<usize>, points: Range<usize>| {
            for row in rows {
                entries.extend(shared.iter().map(|&j| (row, j)));
                for k in points.clone() {
                    entries.extend(layout.point(k).map(|j| (row, j)));
                }
            }
        };

        let per_interval = layout.defects_per_interval();
        for i in 0..layout.mesh.num_intervals() {
            let left = layout.scheme.mesh_index(i);
            let right = layout.scheme.mesh_index(i + 1);
            block(i * per_interval..(i + 1) * per_interval, left..right + 1);
        }

        let nd = layout.num_derivatives;
        for k in 0..layout.num_points() {
            let start = layout.residual_start() + k * nd;
            block(start..start + nd, k..k + 1);
        }

        for i in 0..layout.mesh.num_points() {
            let k = layout.scheme.mesh_index(i);
            let start = layout.path_start() + i * layout.num_path;
            block(start..start + layout.num_path, k..k + 1);
        }

        let last = layout.num_points() - 1;
        let boundary = layout.boundary_start()..layout.num_constraints();
        block(boundary.clone(), 0..1);
        block(boundary, last..last + 1);

        if layout.interpolate_controls {
            let nc = layout.num_controls;
            for i in 0..layout.mesh.num_intervals() {
                let left = layout.scheme.mesh_index(i);
                for c in 0..nc {
                    let row = layout.interpolation_start() + i * nc + c;
                    for k in left..left + 3 {
                        entries.push((row, layout.controls(k).start + c));
                    }
                }
            }
        }

        Pattern::from_entries(layout.num_constraints(), layout.num_variables(), entries)
    }

    /// Builds the derivative structure the backend differentiates with.
    ///
    /// # Errors
    ///
    /// Returns an error if random detection meets an infinite bound or the
    /// problem fails at a detection point.
    pub fn derivatives(
        &self,
        settings: &Settings,
        x0: &[f64],
    ) -> Result<(Derivatives, SparsityReport), Error> {
        let n = self.layout.num_variables();
        let (jacobian, gradient, samples) = match settings.sparsity_detection {
            SparsityDetection::None => (self.block_pattern(), Pattern::dense(1, n), 0),
            SparsityDetection::InitialGuess => {
                let (jacobian, gradient) =
                    detect(self, &[x0.to_vec()]).map_err(EvaluationError::recover)?;
                (jacobian, gradient, 1)
            }
            SparsityDetection::Random => {
                let count = settings.sparsity_detection_random_count;
                let mut rng = ChaCha8Rng::seed_from_u64(settings.random_seed);
                let points = (0..count)
                    .map(|_| guess::random_within_bounds(&self.layout, &mut rng))
                    .collect::<Result<Vec<_>, _>>()?;
                let (jacobian, gradient) =
                    detect(self, &points).map_err(EvaluationError::recover)?;
                (jacobian, gradient, count)
            }
        };

        let report = SparsityReport {
            detection: settings.sparsity_detection,
            samples,
            jacobian_nonzeros: jacobian.nnz(),
            gradient_nonzeros: gradient.nnz(),
            jacobian_colors: jacobian.color_columns().len(),
        };
        debug!(
            "sparsity ({}): {} jacobian nonzeros in {} colors, {} gradient nonzeros",
            report.detection, report.jacobian_nonzeros, report.jacobian_colors, report.gradient_nonzeros
        );

        let derivatives = Derivatives {
            scheme: settings.finite_difference_scheme,
            jacobian,
            gradient,
        };
        Ok((derivatives, report))
    }

    /// Maps `f` over `0..n`, on the pool when one is configured.
    fn map_points<T, F>(&self, n: usize, f: F) -> Result<Vec<T>, EvaluationError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, EvaluationError> + Send + Sync,
    {
        match &self.pool {
            None => (0..n).map(f).collect(),
            Some(pool) => pool.install(|| (0..n).into_par_iter().map(f).collect()),
        }
    }

    fn time_point<'x>(&self, x: &'x [f64], k: usize, horizon: (f64, f64)) -> TimePoint<'x> {
        let layout = &self.layout;
        TimePoint {
            time: layout.time(k, horizon),
            states: &x[layout.states(k)],
            controls: &x[layout.controls(k)],
            multipliers: &x[layout.multipliers(k)],
            derivatives: &x[layout.derivatives(k)],
            parameters: &x[layout.parameters()],
        }
    }

    fn dynamics_at(
        &self,
        x: &[f64],
        k: usize,
        horizon: (f64, f64),
    ) -> Result<Dynamics, EvaluationError> {
        let point = self.time_point(x, k, horizon);
        let time = point.time;
        let Dynamics {
            state_rates,
            residuals,
        } = self
            .problem
            .dynamics(&point)
            .map_err(failed(Function::Dynamics, time))?;

        Ok(Dynamics {
            state_rates: checked(Function::Dynamics, time, self.layout.num_states, state_rates)?,
            residuals: checked(
                Function::Dynamics,
                time,
                self.layout.num_derivatives,
                residuals,
            )?,
        })
    }

    fn evaluate_objective(&self, x: &[f64]) -> Result<f64, EvaluationError> {
        let layout = &self.layout;
        let horizon = layout.horizon(x);
        let n = layout.num_points();

        let integrands = self.map_points(n, |k| {
            let point = self.time_point(x, k, horizon);
            let value = self
                .problem
                .integral_cost(&point)
                .map_err(failed(Function::IntegralCost, point.time))?;
            finite(Function::IntegralCost, point.time, value)
        })?;

        let mut integral: f64 = integrands
            .iter()
            .zip(&layout.weights)
            .map(|(value, w)| w * value)
            .sum();

        if let Some(weight) = self.multiplier_weight {
            let squares: f64 = (0..n)
                .map(|k| {
                    let lambda = &x[layout.multipliers(k)];
                    layout.weights[k] * lambda.iter().map(|l| l * l).sum::<f64>()
                })
                .sum();
            integral += weight * squares;
        }

        let last = self.time_point(x, n - 1, horizon);
        let endpoint = self
            .problem
            .endpoint_cost(&last)
            .map_err(failed(Function::EndpointCost, last.time))?;
        let endpoint = finite(Function::EndpointCost, last.time, endpoint)?;

        Ok((horizon.1 - horizon.0) * integral + endpoint)
    }

    fn evaluate_constraints(&self, x: &[f64], g: &mut [f64]) -> Result<(), EvaluationError> {
        let layout = &self.layout;
        let horizon = layout.horizon(x);
        let duration = horizon.1 - horizon.0;
        let ns = layout.num_states;

        let dynamics = self.map_points(layout.num_points(), |k| self.dynamics_at(x, k, horizon))?;

        let mut row = 0;
        for (i, (start, end)) in layout.mesh.intervals().enumerate() {
            let h = duration * (end - start);
            let left = layout.scheme.mesh_index(i);
            let right = layout.scheme.mesh_index(i + 1);
            let (x_l, x_r) = (&x[layout.states(left)], &x[layout.states(right)]);
            let (f_l, f_r) = (&dynamics[left].state_rates, &dynamics[right].state_rates);

            match layout.scheme {
                Scheme::Trapezoidal => {
                    for s in 0..ns {
                        g[row + s] = x_r[s] - x_l[s] - 0.5 * h * (f_l[s] + f_r[s]);
                    }
                }
                Scheme::HermiteSimpson => {
                    let x_m = &x[layout.states(left + 1)];
                    let f_m = &dynamics[left + 1].state_rates;
                    for s in 0..ns {
                        g[row + s] = x_m[s] - 0.5 * (x_l[s] + x_r[s]) - h / 8.0 * (f_l[s] - f_r[s]);
                        g[row + ns + s] =
                            x_r[s] - x_l[s] - h / 6.0 * (f_l[s] + 4.0 * f_m[s] + f_r[s]);
                    }
                }
            }
            row += layout.defects_per_interval();
        }

        for point in &dynamics {
            g[row..row + point.residuals.len()].copy_from_slice(&point.residuals);
            row += point.residuals.len();
        }

        if layout.interpolate_controls {
            for i in 0..layout.mesh.num_intervals() {
                let left = layout.scheme.mesh_index(i);
                let u_l = &x[layout.controls(left)];
                let u_m = &x[layout.controls(left + 1)];
                let u_r = &x[layout.controls(left + 2)];
                for c in 0..layout.num_controls {
                    g[row + c] = u_m[c] - 0.5 * (u_l[c] + u_r[c]);
                }
                row += layout.num_controls;
            }
        }

        let path = self.map_points(layout.mesh.num_points(), |i| {
            let point = self.time_point(x, layout.scheme.mesh_index(i), horizon);
            let values = self
                .problem
                .path_constraint(&point)
                .map_err(failed(Function::PathConstraint, point.time))?;
            checked(Function::PathConstraint, point.time, layout.num_path, values)
        })?;
        for values in path {
            g[row..row + values.len()].copy_from_slice(&values);
            row += values.len();
        }

        let first = self.time_point(x, 0, horizon);
        let last = self.time_point(x, layout.num_points() - 1, horizon);
        let boundary = self
            .problem
            .boundary_constraint(&first, &last)
            .map_err(failed(Function::BoundaryConstraint, last.time))?;
        let boundary = checked(
            Function::BoundaryConstraint,
            last.time,
            layout.num_boundary,
            boundary,
        )?;
        g[row..].copy_from_slice(&boundary);

        Ok(())
    }
}

impl<P: Problem> Nlp for Transcription<'_, P> {
    fn variable_bounds(&self) -> &[Bounds] {
        &self.layout.variable_bounds
    }

    fn constraint_bounds(&self) -> &[Bounds] {
        &self.layout.constraint_bounds
    }

    fn objective(&self, x: &[f64]) -> Result<f64, EvalError> {
        Ok(self.evaluate_objective(x)?)
    }

    fn constraints(&self, x: &[f64], g: &mut [f64]) -> Result<(), EvalError> {
        Ok(self.evaluate_constraints(x, g)?)
    }
}

fn failed<E>(function: Function, time: f64) -> impl FnOnce(E) -> EvaluationError
where
    E: StdError + Send + Sync + 'static,
{
    move |source| EvaluationError::Callback {
        function,
        time,
        source: Box::new(source),
    }
}

fn finite(function: Function, time: f64, value: f64) -> Result<f64, EvaluationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NonFinite { function, time })
    }
}

fn checked(
    function: Function,
    time: f64,
    expected: usize,
    values: Vec<f64>,
) -> Result<Vec<f64>, EvaluationError> {
    if values.len() != expected {
        return Err(EvaluationError::Dimension {
            function,
            time,
            expected,
            actual: values.len(),
        });
    }
    if values.iter().all(|v| v.is_finite()) {
        Ok(values)
    } else {
        Err(EvaluationError::NonFinite { function, time })
    }
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), ConfigError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConfigError::IterateShape {
            field,
            expected,
            actual,
        })
    }
}

fn check_rows(
    field: &'static str,
    rows: &[Vec<f64>],
    num_points: usize,
    width: usize,
) -> Result<(), ConfigError> {
    if width == 0 && rows.is_empty() {
        return Ok(());
    }
    check_len(field, num_points, rows.len())?;
    rows.iter()
        .try_for_each(|row| check_len(field, width, row.len()))
}
