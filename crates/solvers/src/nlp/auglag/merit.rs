use nalgebra::{DMatrix, DVector};

use crate::nlp::{Differentiator, EvalError, Nlp};

/// An evaluated iterate.
#[derive(Debug, Clone)]
pub(super) struct Point {
    pub x: DVector<f64>,
    pub f: f64,
    pub g: DVector<f64>,

    /// Augmented Lagrangian at `x` for the multipliers and penalty it was
    /// scored with.
    pub value: f64,
}

impl Point {
    pub fn is_finite(&self) -> bool {
        self.f.is_finite() && self.g.iter().all(|v| v.is_finite())
    }
}

/// First derivatives at a [`Point`].
#[derive(Debug, Clone)]
pub(super) struct Slope {
    pub grad_f: DVector<f64>,
    pub jac: DMatrix<f64>,
}

impl Slope {
    /// Gradient of `f + y'g`.
    pub fn lagrangian_gradient(&self, y: &DVector<f64>) -> DVector<f64> {
        &self.grad_f + self.jac.tr_mul(y)
    }
}

/// The augmented Lagrangian of an NLP for fixed multipliers and penalty.
pub(super) struct Merit<'d, 'a, N> {
    diff: &'d Differentiator<'a, N>,
    lower: DVector<f64>,
    upper: DVector<f64>,
    lambda: DVector<f64>,
    penalty: f64,
}

impl<'d, 'a, N: Nlp> Merit<'d, 'a, N> {
    pub fn new(diff: &'d Differentiator<'a, N>, penalty: f64) -> Self {
        let rows = diff.nlp().constraint_bounds();
        Self {
            diff,
            lower: DVector::from_iterator(rows.len(), rows.iter().map(|b| b.lower())),
            upper: DVector::from_iterator(rows.len(), rows.iter().map(|b| b.upper())),
            lambda: DVector::zeros(rows.len()),
            penalty,
        }
    }

    pub fn differentiator(&self) -> &'d Differentiator<'a, N> {
        self.diff
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn set_penalty(&mut self, penalty: f64) {
        self.penalty = penalty;
    }

    pub fn multipliers(&self) -> &DVector<f64> {
        &self.lambda
    }

    /// Evaluates the NLP at `x` and scores the result.
    pub fn evaluate(&self, x: DVector<f64>) -> Result<Point, EvalError> {
        let f = self.diff.objective(x.as_slice())?;
        let g = self.diff.constraints(x.as_slice())?;
        let value = self.value(f, &g);
        Ok(Point { x, f, g, value })
    }

    /// Rescores a point after the multipliers or penalty changed.
    pub fn rescore(&self, point: Point) -> Point {
        let value = self.value(point.f, &point.g);
        Point { value, ..point }
    }

    pub fn slope(&self, point: &Point) -> Result<Slope, EvalError> {
        let x = point.x.as_slice();
        Ok(Slope {
            grad_f: self.diff.gradient(x, point.f)?,
            jac: self.diff.jacobian(x, &point.g)?,
        })
    }

    /// Multipliers that make `f + y'g` share its gradient with the merit.
    pub fn row_multipliers(&self, g: &DVector<f64>) -> DVector<f64> {
        self.excess(g) * self.penalty
    }

    /// Applies the first-order multiplier update at constraint values `g`.
    pub fn update_multipliers(&mut self, g: &DVector<f64>) {
        self.lambda = self.row_multipliers(g);
    }

    /// Rows whose penalty term is locally quadratic.
    pub fn active_rows(&self, g: &DVector<f64>) -> Vec<bool> {
        (0..g.len())
            .map(|i| {
                let s = self.shifted(g, i);
                self.lower[i] == self.upper[i] || s < self.lower[i] || s > self.upper[i]
            })
            .collect()
    }

    fn value(&self, f: f64, g: &DVector<f64>) -> f64 {
        let rho = self.penalty;
        let excess = self.excess(g);
        f + 0.5 * rho * excess.norm_squared() - self.lambda.norm_squared() / (2.0 * rho)
    }

    fn shifted(&self, g: &DVector<f64>, i: usize) -> f64 {
        g[i] + self.lambda[i] / self.penalty
    }

    /// Distance of each shifted row value from its admissible range.
    fn excess(&self, g: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            g.len(),
            (0..g.len()).map(|i| {
                let s = self.shifted(g, i);
                s - s.clamp(self.lower[i], self.upper[i])
            }),
        )
    }
}

/// Largest distance of any row from its admissible range.
///
/// A NaN row counts as infinitely violated.
pub(super) fn violation(g: &DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) -> f64 {
    g.iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(&v, (&lo, &hi))| {
            if v.is_nan() {
                f64::INFINITY
            } else {
                (v - v.clamp(lo, hi)).abs()
            }
        })
        .fold(0.0, f64::max)
}
