use std::{fmt, str::FromStr};

use nalgebra::{DMatrix, DVector};

use crate::nlp::{EvalError, Nlp};

use super::merit::{Merit, Point, Slope};

/// Relative step for differencing the Lagrangian gradient.
const HESSIAN_STEP: f64 = 1e-5;

/// How the inner solver approximates the Hessian of the Lagrangian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum HessianApproximation {
    /// Forward differences of the finite-difference Lagrangian gradient.
    #[default]
    Exact,

    /// Damped BFGS updates from successive gradients.
    LimitedMemory,
}

impl HessianApproximation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::LimitedMemory => "limited-memory",
        }
    }
}

impl fmt::Display for HessianApproximation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HessianApproximation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "limited-memory" => Ok(Self::LimitedMemory),
            other => Err(other.to_owned()),
        }
    }
}

/// Curvature state carried across inner iterations.
pub(super) enum Curvature {
    Exact,
    Bfgs { matrix: DMatrix<f64>, scaled: bool },
}

impl Curvature {
    pub fn new(kind: HessianApproximation, n: usize) -> Self {
        match kind {
            HessianApproximation::Exact => Self::Exact,
            HessianApproximation::LimitedMemory => Self::Bfgs {
                matrix: DMatrix::identity(n, n),
                scaled: false,
            },
        }
    }

    /// Hessian of `f + y'g` at `point`.
    ///
    /// Only the rows and columns of `free` variables are meaningful.
    pub fn lagrangian_hessian<N: Nlp>(
        &self,
        merit: &Merit<'_, '_, N>,
        point: &Point,
        slope: &Slope,
        y: &DVector<f64>,
        free: &[bool],
    ) -> Result<DMatrix<f64>, EvalError> {
        match self {
            Self::Exact => finite_difference(merit, point, slope, y, free),
            Self::Bfgs { matrix, .. } => Ok(matrix.clone()),
        }
    }

    /// Records a step `s` and the matching Lagrangian gradient change `delta`.
    ///
    /// Uses Powell's damping so the approximation stays positive definite.
    pub fn update(&mut self, s: &DVector<f64>, delta: &DVector<f64>) {
        let Self::Bfgs { matrix, scaled } = self else {
            return;
        };

        let sy = s.dot(delta);
        if !*scaled && sy > 0.0 {
            *matrix *= delta.norm_squared() / sy;
            *scaled = true;
        }

        let bs = &*matrix * s;
        let sbs = s.dot(&bs);
        if sbs.is_nan() || sbs <= f64::EPSILON * s.norm_squared() {
            return;
        }

        let theta = if sy >= 0.2 * sbs {
            1.0
        } else {
            0.8 * sbs / (sbs - sy)
        };
        let r = delta * theta + &bs * (1.0 - theta);
        let sr = s.dot(&r);
        if !sr.is_finite() || sr <= 0.0 {
            return;
        }

        *matrix -= &bs * bs.transpose() / sbs;
        *matrix += &r * r.transpose() / sr;
    }
}

fn finite_difference<N: Nlp>(
    merit: &Merit<'_, '_, N>,
    point: &Point,
    slope: &Slope,
    y: &DVector<f64>,
    free: &[bool],
) -> Result<DMatrix<f64>, EvalError> {
    let n = point.x.len();
    let base = slope.lagrangian_gradient(y);
    let mut hessian = DMatrix::zeros(n, n);

    for j in (0..n).filter(|&j| free[j]) {
        let h = HESSIAN_STEP * point.x[j].abs().max(1.0);
        let mut x = point.x.clone();
        x[j] += h;

        let shifted = merit.evaluate(x)?;
        let column = (merit.slope(&shifted)?.lagrangian_gradient(y) - &base) / h;
        hessian.set_column(j, &column);
    }

    for j in (0..n).filter(|&j| free[j]) {
        for i in (j + 1..n).filter(|&i| free[i]) {
            let mean = 0.5 * (hessian[(i, j)] + hessian[(j, i)]);
            hessian[(i, j)] = mean;
            hessian[(j, i)] = mean;
        }
    }

    Ok(hessian)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn bfgs_update_satisfies_secant_condition() {
        let mut curvature = Curvature::new(HessianApproximation::LimitedMemory, 2);
        let s = DVector::from_vec(vec![1.0, 0.5]);
        let delta = DVector::from_vec(vec![2.0, 1.5]);

        curvature.update(&s, &delta);

        let Curvature::Bfgs { matrix, .. } = &curvature else {
            panic!("expected BFGS curvature");
        };
        let bs = matrix * &s;
        assert_relative_eq!(bs[0], delta[0], epsilon = 1e-12);
        assert_relative_eq!(bs[1], delta[1], epsilon = 1e-12);
        assert!(matrix.clone().cholesky().is_some());
    }

    #[test]
    fn bfgs_update_stays_positive_definite_on_negative_curvature() {
        let mut curvature = Curvature::new(HessianApproximation::LimitedMemory, 2);
        curvature.update(
            &DVector::from_vec(vec![1.0, 0.0]),
            &DVector::from_vec(vec![1.0, 0.0]),
        );
        curvature.update(
            &DVector::from_vec(vec![0.0, 1.0]),
            &DVector::from_vec(vec![0.0, -3.0]),
        );

        let Curvature::Bfgs { matrix, .. } = &curvature else {
            panic!("expected BFGS curvature");
        };
        assert!(matrix.clone().cholesky().is_some());
    }

    #[test]
    fn approximation_names() {
        assert_eq!("exact".parse(), Ok(HessianApproximation::Exact));
        assert_eq!(
            "limited-memory".parse(),
            Ok(HessianApproximation::LimitedMemory)
        );
        assert_eq!(HessianApproximation::default().as_str(), "exact");
        assert!("gauss-newton".parse::<HessianApproximation>().is_err());
    }
}
