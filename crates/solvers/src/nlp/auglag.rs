//! Augmented Lagrangian solver for bound- and range-constrained NLPs.
//!
//! # Algorithm
//!
//! Constraint rows `gL <= g(x) <= gU` are moved into the objective with a
//! Powell–Hestenes–Rockafellar penalty while variable bounds are kept
//! explicit. Each outer iteration approximately minimizes
//!
//! ```text
//! L(x) = f(x) + (rho / 2) * sum_i (s_i - clamp(s_i, gL_i, gU_i))^2,
//! s_i  = g_i(x) + lambda_i / rho
//! ```
//!
//! over the variable box with a projected Newton method, then updates the
//! multiplier estimates `lambda`. The penalty `rho` grows whenever the
//! constraint violation fails to shrink fast enough.
//!
//! The inner Newton matrix is the Hessian of the Lagrangian, either by
//! finite differences of its gradient or by damped BFGS updates, plus the
//! Gauss–Newton term of the penalized rows.
//!
//! # Observer Events
//!
//! The solver emits one [`Event`] after every outer iteration. Observers can
//! return [`Action::StopEarly`] to halt with the current iterate.
//!
//! # Limitations
//!
//! Derivatives come from finite differences, so tolerances much tighter than
//! about `1e-8` relative to the problem scale are not reachable.

mod action;
mod config;
mod error;
mod event;
mod hessian;
mod inner;
mod merit;
mod solution;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::Event;
pub use hessian::HessianApproximation;
pub use solution::Solution;

use colloc_core::Observer;
use log::debug;
use nalgebra::DVector;

use super::{Derivatives, Differentiator, Nlp, Status};

use hessian::Curvature;
use inner::{InnerOutcome, minimize_box};
use merit::{Merit, violation};

/// Consecutive stalled inner solves tolerated before giving up.
const MAX_STALLS: usize = 3;

/// Minimizes `nlp` starting from `x0`.
///
/// `x0` is projected onto the variable bounds before the first evaluation.
/// The observer receives an [`Event`] after each outer iteration.
///
/// # Errors
///
/// Returns an error if `x0` has the wrong length, the starting point does
/// not evaluate to finite values, or the NLP fails at an accepted iterate.
pub fn minimize<N, Obs>(
    nlp: &N,
    derivatives: &Derivatives,
    x0: &[f64],
    config: &Config,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    N: Nlp,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let n = nlp.num_variables();
    if x0.len() != n {
        return Err(Error::Dimension {
            expected: n,
            actual: x0.len(),
        });
    }

    let diff = Differentiator::new(nlp, derivatives);
    let (lower, upper) = split_bounds(nlp.variable_bounds());
    let x = DVector::from_iterator(
        n,
        x0.iter()
            .zip(lower.iter().zip(upper.iter()))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi)),
    );

    let mut merit = Merit::new(&diff, config.initial_penalty());
    let mut point = merit.evaluate(x).map_err(Error::Evaluation)?;
    if !point.is_finite() {
        return Err(Error::NonFinite);
    }

    let mut curvature = Curvature::new(config.hessian_approximation(), n);
    let mut previous_violation = f64::INFINITY;
    let mut progress = Progress::default();
    let mut stalls = 0;

    for iteration in 1..=config.max_iterations() {
        progress.iterations = iteration;

        let omega = if nlp.num_constraints() == 0
            || previous_violation <= config.constraint_tolerance()
        {
            config.tolerance()
        } else {
            inner_tolerance(iteration, config.tolerance())
        };

        let InnerOutcome {
            point: next,
            iterations,
            optimality,
            stalled,
        } = minimize_box(
            &merit,
            &mut curvature,
            point,
            (&lower, &upper),
            omega,
            config.max_inner_iterations(),
        )
        .map_err(Error::Evaluation)?;
        point = next;
        progress.inner_iterations += iterations;
        progress.optimality = optimality;

        merit.update_multipliers(&point.g);
        let infeasibility = violation(&point.g, merit.lower(), merit.upper());

        debug!(
            "auglag {iteration:>3}: f = {:.6e}, infeasibility = {infeasibility:.3e}, \
             optimality = {optimality:.3e}, rho = {:.1e}, inner = {iterations}",
            point.f,
            merit.penalty()
        );

        let event = Event {
            iteration,
            x: point.x.as_slice(),
            objective: point.f,
            infeasibility,
            optimality,
            penalty: merit.penalty(),
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return Ok(finish(Status::StoppedByObserver, &point, &merit, progress));
        }

        let feasible = infeasibility <= config.constraint_tolerance();
        if feasible && optimality <= config.tolerance() {
            return Ok(finish(Status::Converged, &point, &merit, progress));
        }

        stalls = if stalled { stalls + 1 } else { 0 };
        if stalls >= MAX_STALLS {
            return Ok(finish(Status::NumericalFailure, &point, &merit, progress));
        }

        if !feasible && infeasibility > 0.25 * previous_violation {
            let penalty = merit.penalty() * config.penalty_growth();
            if penalty > config.max_penalty() {
                return Ok(finish(Status::Infeasible, &point, &merit, progress));
            }
            merit.set_penalty(penalty);
        }
        point = merit.rescore(point);
        previous_violation = infeasibility;
    }

    Ok(finish(Status::MaxIterations, &point, &merit, progress))
}

/// Counters carried into the [`Solution`].
#[derive(Debug, Clone, Copy)]
struct Progress {
    iterations: usize,
    inner_iterations: usize,
    optimality: f64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            iterations: 0,
            inner_iterations: 0,
            optimality: f64::INFINITY,
        }
    }
}

fn finish<N: Nlp>(
    status: Status,
    point: &merit::Point,
    merit: &Merit<'_, '_, N>,
    progress: Progress,
) -> Solution {
    Solution {
        status,
        x: point.x.as_slice().to_vec(),
        multipliers: merit.multipliers().as_slice().to_vec(),
        objective: point.f,
        infeasibility: violation(&point.g, merit.lower(), merit.upper()),
        optimality: progress.optimality,
        iterations: progress.iterations,
        inner_iterations: progress.inner_iterations,
        objective_evaluations: merit.differentiator().objective_evaluations(),
        constraint_evaluations: merit.differentiator().constraint_evaluations(),
    }
}

/// Minimizes `nlp` without observer support.
///
/// This is a convenience wrapper around [`minimize`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error under the same conditions as [`minimize`].
pub fn minimize_unobserved<N: Nlp>(
    nlp: &N,
    derivatives: &Derivatives,
    x0: &[f64],
    config: &Config,
) -> Result<Solution, Error> {
    minimize(nlp, derivatives, x0, config, ())
}

/// Inner stationarity tolerance for an outer iteration, tightening tenfold
/// per iteration down to `tolerance`.
fn inner_tolerance(iteration: usize, tolerance: f64) -> f64 {
    let exponent = i32::try_from(iteration).unwrap_or(i32::MAX);
    0.1_f64.powi(exponent).max(tolerance)
}

fn split_bounds(bounds: &[colloc_core::Bounds]) -> (DVector<f64>, DVector<f64>) {
    (
        DVector::from_iterator(bounds.len(), bounds.iter().map(colloc_core::Bounds::lower)),
        DVector::from_iterator(bounds.len(), bounds.iter().map(colloc_core::Bounds::upper)),
    )
}
