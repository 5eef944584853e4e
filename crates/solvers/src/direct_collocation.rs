//! Direct collocation for continuous-time optimal control.
//!
//! # Algorithm
//!
//! The horizon `[t0, tf]` is split by a normalized [`Mesh`]. A collocation
//! [`Scheme`] places decision variables at grid points and replaces the
//! dynamics with algebraic defect constraints between neighbouring points:
//!
//! - **trapezoidal**: one grid point per mesh point,
//!   `x[i+1] - x[i] - h/2 (f[i] + f[i+1]) = 0`
//! - **hermite-simpson** (default): mesh points plus interval midpoints,
//!   `x[m] - (x[i] + x[i+1])/2 - h/8 (f[i] - f[i+1]) = 0` and
//!   `x[i+1] - x[i] - h/6 (f[i] + 4 f[m] + f[i+1]) = 0`
//!
//! Path constraints hold at every mesh point, boundary constraints relate
//! the first and last point, and the integral cost is integrated with the
//! scheme's quadrature. The resulting NLP is solved by the backend chosen
//! with [`Solver::set_optim_solver`].
//!
//! In implicit mode the problem also declares derivative variables and the
//! transcription adds its residuals as equality rows at every grid point.
//!
//! # Configuration
//!
//! All configuration lives in [`Settings`], which a [`Solver`] validates as
//! it is changed. Enumerated settings are parsed when set; the scheme name
//! is only checked when a transcription is created. A mesh must be set
//! before any iterate can be built or a solve started.
//!
//! # Observer Events
//!
//! When `callback_interval` is positive, the observer receives an [`Event`]
//! carrying the decoded iterate every `callback_interval` backend
//! iterations. Returning [`Action::StopEarly`] ends the solve with status
//! [`Status::StoppedByObserver`].
//!
//! # Concurrency
//!
//! Per-point evaluations of the dynamics, the integral cost, and path
//! constraints are the only parallel work. They run on a dedicated thread
//! pool when [`Parallelism::Thread`] is selected.

mod action;
mod error;
mod event;
mod guess;
mod layout;
mod scheme;
mod settings;
mod solution;
mod transcription;


pub use action::Action;
pub use error::{ConfigError, Error, EvaluationError, Function};
pub use event::Event;
pub use scheme::Scheme;
pub use settings::{Parallelism, Settings, SparsityDetection};
pub use solution::{Solution, SparsityReport, Status};
pub use transcription::Transcription;

use std::time::Instant;

use colloc_core::{Bounds, DynamicsMode, Iterate, Mesh, Observer, Problem};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::nlp::{Derivatives, FiniteDifference, OptimSolver, Options, PluginOptions, auglag};

/// Configures and runs direct collocation solves of a borrowed problem.
///
/// The solver never mutates the problem, and each solve builds a fresh
/// transcription from the current settings, so settings may be changed
/// freely between solves.
#[derive(Debug, Clone)]
pub struct Solver<'p, P> {
    problem: &'p P,
    settings: Settings,
}

impl<'p, P: Problem> Solver<'p, P> {
    /// Creates a solver with default settings and no mesh.
    pub fn new(problem: &'p P) -> Self {
        Self {
            problem,
            settings: Settings::default(),
        }
    }

    /// Creates a solver from a complete settings bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings violate a setter invariant.
    pub fn with_settings(problem: &'p P, settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { problem, settings })
    }

    #[must_use]
    pub fn problem(&self) -> &'p P {
        self.problem
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the mesh with explicit normalized points.
    ///
    /// # Errors
    ///
    /// Returns an error if the points do not form a valid [`Mesh`]. The
    /// previous mesh is kept in that case.
    pub fn set_mesh(&mut self, points: Vec<f64>) -> Result<(), ConfigError> {
        self.settings.mesh = Some(Mesh::new(points)?);
        Ok(())
    }

    /// Replaces the mesh with `num_points` uniformly spaced points.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_points < 2`.
    pub fn set_num_mesh_points(&mut self, num_points: usize) -> Result<(), ConfigError> {
        self.settings.mesh = Some(Mesh::uniform(num_points)?);
        Ok(())
    }

    #[must_use]
    pub fn mesh(&self) -> Option<&Mesh> {
        self.settings.mesh.as_ref()
    }

    /// Records the scheme name; unknown names fail when a transcription is
    /// created.
    pub fn set_transcription_scheme(&mut self, name: impl Into<String>) {
        self.settings.transcription_scheme = name.into();
    }

    #[must_use]
    pub fn transcription_scheme(&self) -> &str {
        &self.settings.transcription_scheme
    }

    #[must_use]
    pub fn dynamics_mode(&self) -> DynamicsMode {
        self.problem.dynamics_mode()
    }

    #[must_use]
    pub fn is_dynamics_mode_implicit(&self) -> bool {
        self.dynamics_mode() == DynamicsMode::Implicit
    }

    /// Adds `weight * ∫ Σ λ² dt` to the objective when enabled.
    pub fn set_minimize_lagrange_multipliers(&mut self, enabled: bool) {
        self.settings.minimize_lagrange_multipliers = enabled;
    }

    #[must_use]
    pub fn minimize_lagrange_multipliers(&self) -> bool {
        self.settings.minimize_lagrange_multipliers
    }

    /// Sets the multiplier regularization weight, checked at solve time.
    pub fn set_lagrange_multiplier_weight(&mut self, weight: f64) {
        self.settings.lagrange_multiplier_weight = weight;
    }

    #[must_use]
    pub fn lagrange_multiplier_weight(&self) -> f64 {
        self.settings.lagrange_multiplier_weight
    }

    pub fn set_implicit_mode_acceleration_bounds(&mut self, bounds: Bounds) {
        self.settings.implicit_mode_acceleration_bounds = bounds;
    }

    #[must_use]
    pub fn implicit_mode_acceleration_bounds(&self) -> Bounds {
        self.settings.implicit_mode_acceleration_bounds
    }

    pub fn set_implicit_component_derivative_bounds(&mut self, bounds: Bounds) {
        self.settings.implicit_component_derivative_bounds = bounds;
    }

    #[must_use]
    pub fn implicit_component_derivative_bounds(&self) -> Bounds {
        self.settings.implicit_component_derivative_bounds
    }

    pub fn set_interpolate_control_midpoints(&mut self, enabled: bool) {
        self.settings.interpolate_control_midpoints = enabled;
    }

    #[must_use]
    pub fn interpolate_control_midpoints(&self) -> bool {
        self.settings.interpolate_control_midpoints
    }

    /// Selects `"central"`, `"forward"`, or `"backward"` differences.
    ///
    /// # Errors
    ///
    /// Returns an error for any other name.
    pub fn set_finite_difference_scheme(&mut self, name: &str) -> Result<(), ConfigError> {
        self.settings.finite_difference_scheme =
            name.parse().map_err(unknown("finite_difference_scheme"))?;
        Ok(())
    }

    #[must_use]
    pub fn finite_difference_scheme(&self) -> FiniteDifference {
        self.settings.finite_difference_scheme
    }

    /// Selects `"none"`, `"initial-guess"`, or `"random"` detection.
    ///
    /// # Errors
    ///
    /// Returns an error for any other name.
    pub fn set_sparsity_detection(&mut self, name: &str) -> Result<(), ConfigError> {
        self.settings.sparsity_detection = name.parse().map_err(unknown("sparsity_detection"))?;
        Ok(())
    }

    #[must_use]
    pub fn sparsity_detection(&self) -> SparsityDetection {
        self.settings.sparsity_detection
    }

    /// Sets how many random iterates random detection samples.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is zero.
    pub fn set_sparsity_detection_random_count(&mut self, count: usize) -> Result<(), ConfigError> {
        if count == 0 {
            return Err(ConfigError::ZeroRandomCount);
        }
        self.settings.sparsity_detection_random_count = count;
        Ok(())
    }

    #[must_use]
    pub fn sparsity_detection_random_count(&self) -> usize {
        self.settings.sparsity_detection_random_count
    }

    /// Writes the sparsity patterns of each solve to files starting with
    /// `prefix`; an empty prefix disables writing.
    pub fn set_write_sparsity(&mut self, prefix: impl Into<String>) {
        self.settings.write_sparsity = prefix.into();
    }

    #[must_use]
    pub fn write_sparsity(&self) -> &str {
        &self.settings.write_sparsity
    }

    /// Selects `"serial"` evaluation or a `"thread"` pool of `num_threads`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown mode or a zero thread count.
    pub fn set_parallelism(&mut self, mode: &str, num_threads: usize) -> Result<(), ConfigError> {
        self.settings.parallelism = Parallelism::new(mode, num_threads)?;
        Ok(())
    }

    #[must_use]
    pub fn parallelism(&self) -> Parallelism {
        self.settings.parallelism
    }

    /// Sets options for the solve wrapper, checked at solve time.
    pub fn set_plugin_options(&mut self, options: Options) {
        self.settings.plugin_options = options;
    }

    #[must_use]
    pub fn plugin_options(&self) -> &Options {
        &self.settings.plugin_options
    }

    /// Sets backend options, checked at solve time.
    pub fn set_solver_options(&mut self, options: Options) {
        self.settings.solver_options = options;
    }

    #[must_use]
    pub fn solver_options(&self) -> &Options {
        &self.settings.solver_options
    }

    /// Selects the NLP backend by name.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown backend.
    pub fn set_optim_solver(&mut self, name: &str) -> Result<(), ConfigError> {
        self.settings.optim_solver = name.parse().map_err(unknown("optim_solver"))?;
        Ok(())
    }

    #[must_use]
    pub fn optim_solver(&self) -> OptimSolver {
        self.settings.optim_solver
    }

    /// Sets the backend iterations between observer calls; 0 disables them.
    pub fn set_callback_interval(&mut self, interval: usize) {
        self.settings.callback_interval = interval;
    }

    #[must_use]
    pub fn callback_interval(&self) -> usize {
        self.settings.callback_interval
    }

    pub fn set_random_seed(&mut self, seed: u64) {
        self.settings.random_seed = seed;
    }

    #[must_use]
    pub fn random_seed(&self) -> u64 {
        self.settings.random_seed
    }

    /// Transcribes the problem with the current scheme and mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is unknown or no mesh is set.
    pub fn transcription(&self) -> Result<Transcription<'p, P>, Error> {
        Transcription::new(self.problem, &self.settings)
    }

    /// Builds an iterate from the midpoint guess of every variable's bounds.
    ///
    /// Half-bounded and unbounded variables take zero clamped into their
    /// bounds. The result only depends on the problem, scheme, and mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is unknown or no mesh is set.
    pub fn create_initial_guess_from_bounds(&self) -> Result<Iterate, Error> {
        Ok(self.transcription()?.initial_guess_from_bounds())
    }

    /// Builds an iterate sampled uniformly within every variable's bounds.
    ///
    /// Sampling is seeded by `random_seed`, so repeated calls with the same
    /// settings return the same iterate.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is unknown, no mesh is set, or any
    /// variable has an infinite bound.
    pub fn create_random_iterate_within_bounds(&self) -> Result<Iterate, Error> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.settings.random_seed);
        Ok(self.transcription()?.random_iterate(&mut rng)?)
    }

    /// Interpolates `iterate` onto the current grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheme is unknown, no mesh is set, or the
    /// iterate's trajectories do not match its own times or this problem's
    /// variables.
    pub fn resample_iterate(&self, iterate: &Iterate) -> Result<Iterate, Error> {
        let transcription = self.transcription()?;
        transcription.check_widths(iterate)?;
        Ok(iterate.resample(transcription.grid()))
    }

    /// Solves the problem from `guess` without observing progress.
    ///
    /// # Errors
    ///
    /// See [`Solver::solve_observed`].
    pub fn solve(&self, guess: &Iterate) -> Result<Solution, Error> {
        self.solve_observed(guess, ())
    }

    /// Solves the problem from `guess`.
    ///
    /// Backend non-convergence is reported through [`Solution::status`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid, `guess` does not match
    /// the current grid, a problem function fails or returns a non-finite
    /// value, or the sparsity files cannot be written.
    pub fn solve_observed<Obs>(&self, guess: &Iterate, mut observer: Obs) -> Result<Solution, Error>
    where
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let settings = &self.settings;
        let transcription = self.transcription()?;
        settings.validate_for_solve()?;
        let plugin = PluginOptions::from_options(&settings.plugin_options)
            .map_err(ConfigError::from)?;
        let config = settings
            .optim_solver
            .config(&settings.solver_options)
            .map_err(ConfigError::from)?;

        let transcription = transcription.with_parallelism(settings.parallelism)?;
        let x0 = transcription.encode(guess)?;
        let (derivatives, sparsity) = transcription.derivatives(settings, &x0)?;
        self.write_sparsity_files(&derivatives)?;

        if plugin.verbose {
            info!(
                "solving with {} ({} scheme, {} points): {} variables, {} constraints",
                settings.optim_solver,
                transcription.scheme(),
                transcription.num_points(),
                x0.len(),
                derivatives.jacobian.nrows(),
            );
        }

        let interval = settings.callback_interval;
        let adapter = |event: &auglag::Event<'_>| {
            if plugin.verbose {
                info!(
                    "iteration {:>4}: objective = {:.9e}, infeasibility = {:.3e}, optimality = {:.3e}",
                    event.iteration, event.objective, event.infeasibility, event.optimality
                );
            }
            if interval == 0 || event.iteration % interval != 0 {
                return None;
            }

            let iterate = transcription.decode(event.x);
            let event = Event {
                iteration: event.iteration,
                objective: event.objective,
                infeasibility: event.infeasibility,
                optimality: event.optimality,
                iterate: &iterate,
            };
            observer.observe(&event).map(|action| match action {
                Action::StopEarly => auglag::Action::StopEarly,
            })
        };

        let start = Instant::now();
        let result = settings
            .optim_solver
            .solve(&transcription, &derivatives, &x0, &config, adapter)?;
        let solve_time = start.elapsed();

        if plugin.verbose {
            info!(
                "finished with status {:?} after {} iterations, objective = {:.9e}",
                result.status, result.iterations, result.objective
            );
        }
        if plugin.print_time {
            info!("solve time: {solve_time:.3?}");
        }

        Ok(Solution {
            status: result.status,
            iterate: transcription.decode(&result.x),
            objective: result.objective,
            infeasibility: result.infeasibility,
            optimality: result.optimality,
            constraint_multipliers: result.multipliers,
            iterations: result.iterations,
            objective_evaluations: result.objective_evaluations,
            constraint_evaluations: result.constraint_evaluations,
            solve_time,
            sparsity,
        })
    }

    fn write_sparsity_files(&self, derivatives: &Derivatives) -> Result<(), Error> {
        let prefix = &self.settings.write_sparsity;
        if prefix.is_empty() {
            return Ok(());
        }
        derivatives
            .jacobian
            .write_matrix_market(format!("{prefix}_constraint_Jacobian_sparsity.mtx"))
            .map_err(Error::WriteSparsity)?;
        derivatives
            .gradient
            .write_matrix_market(format!("{prefix}_objective_gradient_sparsity.mtx"))
            .map_err(Error::WriteSparsity)
    }
}

fn unknown(setting: &'static str) -> impl FnOnce(String) -> ConfigError {
    move |value| ConfigError::UnknownValue { setting, value }
}
