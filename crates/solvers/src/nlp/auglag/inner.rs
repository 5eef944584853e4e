use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::nlp::{EvalError, Nlp};

use super::{
    hessian::Curvature,
    merit::{Merit, Point, Slope},
};

/// Sufficient decrease parameter of the Armijo rule.
const ARMIJO: f64 = 1e-4;

/// Maximum step halvings per line search.
const MAX_BACKTRACKS: usize = 40;

/// Upper limit on the width of the near-active band around bounds.
const ACTIVE_BAND: f64 = 1e-3;

/// Maximum diagonal shifts tried when the Newton matrix is not positive definite.
const MAX_SHIFTS: usize = 30;

pub(super) struct InnerOutcome {
    pub point: Point,
    pub iterations: usize,

    /// Projected gradient norm of the merit at `point`.
    pub optimality: f64,

    /// Whether the solve ended because no acceptable step was found.
    pub stalled: bool,
}

/// Minimizes the merit over the box `lower <= x <= upper` with a projected
/// Newton method.
///
/// Variables within a shrinking band of a bound whose gradient pushes them
/// outward are held on a projected-gradient path, and the rest take a Newton
/// step. Steps are accepted by an Armijo rule along the projection arc.
pub(super) fn minimize_box<N: Nlp>(
    merit: &Merit<'_, '_, N>,
    curvature: &mut Curvature,
    start: Point,
    (lower, upper): (&DVector<f64>, &DVector<f64>),
    tolerance: f64,
    max_iterations: usize,
) -> Result<InnerOutcome, EvalError> {
    let mut point = start;
    let mut slope = merit.slope(&point)?;
    let mut y = merit.row_multipliers(&point.g);
    let mut grad = slope.lagrangian_gradient(&y);
    let mut optimality = projected_gradient_norm(&point.x, &grad, lower, upper);

    for iteration in 0..max_iterations {
        if optimality <= tolerance {
            return Ok(InnerOutcome {
                point,
                iterations: iteration,
                optimality,
                stalled: false,
            });
        }

        let free = free_variables(&point.x, &grad, lower, upper, optimality);
        let newton = newton_direction(merit, curvature, &point, &slope, &y, &grad, &free)?;

        let mut accepted = match newton {
            Some(d) => line_search(merit, &point, &grad, &d, &free, (lower, upper))?,
            None => None,
        };
        if accepted.is_none() {
            trace!("newton step rejected, falling back to projected gradient");
            let none = vec![false; free.len()];
            let zero = DVector::zeros(grad.len());
            accepted = line_search(merit, &point, &grad, &zero, &none, (lower, upper))?;
        }

        let Some(next) = accepted else {
            trace!("inner solve stalled at optimality {optimality:.3e}");
            return Ok(InnerOutcome {
                point,
                iterations: iteration,
                optimality,
                stalled: true,
            });
        };

        let next_slope = merit.slope(&next)?;
        curvature.update(
            &(&next.x - &point.x),
            &(next_slope.lagrangian_gradient(&y) - slope.lagrangian_gradient(&y)),
        );

        point = next;
        slope = next_slope;
        y = merit.row_multipliers(&point.g);
        grad = slope.lagrangian_gradient(&y);
        optimality = projected_gradient_norm(&point.x, &grad, lower, upper);
        trace!(
            "inner {iteration:>3}: merit = {:.9e}, optimality = {optimality:.3e}",
            point.value
        );
    }

    Ok(InnerOutcome {
        point,
        iterations: max_iterations,
        optimality,
        stalled: false,
    })
}

/// Infinity norm of `x - P(x - grad)`, where `P` projects onto the box.
pub(super) fn projected_gradient_norm(
    x: &DVector<f64>,
    grad: &DVector<f64>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
) -> f64 {
    (0..x.len())
        .map(|i| (x[i] - (x[i] - grad[i]).clamp(lower[i], upper[i])).abs())
        .fold(0.0, f64::max)
}

/// Marks variables that take a Newton step.
///
/// Fixed variables and variables near a bound with the gradient pointing
/// out of the box are excluded.
fn free_variables(
    x: &DVector<f64>,
    grad: &DVector<f64>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
    optimality: f64,
) -> Vec<bool> {
    let band = optimality.min(ACTIVE_BAND);
    (0..x.len())
        .map(|i| {
            let fixed = lower[i] == upper[i];
            let at_lower = x[i] - lower[i] <= band && grad[i] > 0.0;
            let at_upper = upper[i] - x[i] <= band && grad[i] < 0.0;
            !(fixed || at_lower || at_upper)
        })
        .collect()
}

/// Solves the reduced Newton system over the free variables.
///
/// Returns `None` if no positive definite shift of the matrix was found.
fn newton_direction<N: Nlp>(
    merit: &Merit<'_, '_, N>,
    curvature: &Curvature,
    point: &Point,
    slope: &Slope,
    y: &DVector<f64>,
    grad: &DVector<f64>,
    free: &[bool],
) -> Result<Option<DVector<f64>>, EvalError> {
    let n = grad.len();
    let cols: Vec<usize> = (0..n).filter(|&j| free[j]).collect();
    if cols.is_empty() {
        return Ok(Some(DVector::zeros(n)));
    }

    let hessian = curvature.lagrangian_hessian(merit, point, slope, y, free)?;
    let rows: Vec<usize> = merit
        .active_rows(&point.g)
        .iter()
        .enumerate()
        .filter_map(|(i, &active)| active.then_some(i))
        .collect();

    let nf = cols.len();
    let mut matrix = DMatrix::from_fn(nf, nf, |a, b| hessian[(cols[a], cols[b])]);
    if !rows.is_empty() {
        let jac = DMatrix::from_fn(rows.len(), nf, |r, b| slope.jac[(rows[r], cols[b])]);
        matrix += jac.tr_mul(&jac) * merit.penalty();
    }
    let rhs = DVector::from_fn(nf, |a, _| -grad[cols[a]]);

    let Some(step) = solve_shifted(matrix, &rhs) else {
        return Ok(None);
    };

    let mut direction = DVector::zeros(n);
    for (a, &j) in cols.iter().enumerate() {
        direction[j] = step[a];
    }
    Ok(Some(direction))
}

/// Solves `(matrix + tau I) d = rhs` for the smallest tried `tau >= 0` that
/// admits a Cholesky factorization.
fn solve_shifted(matrix: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = matrix.clone().cholesky() {
        return Some(chol.solve(rhs));
    }

    let scale = matrix.diagonal().amax().max(1.0);
    let mut tau = 1e-8 * scale;
    for _ in 0..MAX_SHIFTS {
        let shifted = &matrix + DMatrix::identity(matrix.nrows(), matrix.ncols()) * tau;
        if let Some(chol) = shifted.cholesky() {
            trace!("newton matrix shifted by {tau:.3e}");
            return Some(chol.solve(rhs));
        }
        tau *= 10.0;
    }
    None
}

/// Backtracks along the projection arc until the Armijo condition holds.
///
/// Free variables move along `direction` and the others along `-grad`.
/// Returns `None` when no trial point satisfies the condition, and fails
/// as soon as the NLP cannot evaluate a trial point.
fn line_search<N: Nlp>(
    merit: &Merit<'_, '_, N>,
    point: &Point,
    grad: &DVector<f64>,
    direction: &DVector<f64>,
    free: &[bool],
    (lower, upper): (&DVector<f64>, &DVector<f64>),
) -> Result<Option<Point>, EvalError> {
    let n = grad.len();
    let mut alpha = 1.0;

    for _ in 0..MAX_BACKTRACKS {
        let trial = DVector::from_fn(n, |i, _| {
            let step = if free[i] { direction[i] } else { -grad[i] };
            (point.x[i] + alpha * step).clamp(lower[i], upper[i])
        });

        if trial == point.x {
            return Ok(None);
        }

        let predicted: f64 = (0..n)
            .map(|i| {
                if free[i] {
                    -alpha * grad[i] * direction[i]
                } else {
                    grad[i] * (point.x[i] - trial[i])
                }
            })
            .sum();

        let candidate = merit.evaluate(trial)?;
        if candidate.value.is_finite()
            && candidate.is_finite()
            && point.value - candidate.value >= ARMIJO * predicted
        {
            return Ok(Some(candidate));
        }

        alpha *= 0.5;
    }

    Ok(None)
}
