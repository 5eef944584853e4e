use std::{cell::Cell, fmt, str::FromStr};

use nalgebra::{DMatrix, DVector};

use super::{EvalError, Nlp, Pattern};

/// Finite-difference formula used for first derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum FiniteDifference {
    Forward,
    #[default]
    Central,
    Backward,
}

impl FiniteDifference {
    /// Returns the canonical name of the formula.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Central => "central",
            Self::Backward => "backward",
        }
    }

    /// Step size for a variable with value `x`.
    ///
    /// Steps scale with `max(1, |x|)` and use the error-optimal base step of
    /// each formula.
    #[must_use]
    pub fn step(&self, x: f64) -> f64 {
        let scale = x.abs().max(1.0);
        match self {
            Self::Central => f64::EPSILON.cbrt() * scale,
            Self::Forward | Self::Backward => f64::EPSILON.sqrt() * scale,
        }
    }
}

impl fmt::Display for FiniteDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FiniteDifference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Self::Forward),
            "central" => Ok(Self::Central),
            "backward" => Ok(Self::Backward),
            other => Err(other.to_owned()),
        }
    }
}

/// Everything a backend needs to differentiate an [`Nlp`].
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives {
    pub scheme: FiniteDifference,

    /// Nonzero structure of the constraint Jacobian.
    pub jacobian: Pattern,

    /// Nonzero structure of the objective gradient, as a single row.
    pub gradient: Pattern,
}

impl Derivatives {
    /// Declares every derivative entry as a potential nonzero.
    #[must_use]
    pub fn dense(scheme: FiniteDifference, num_variables: usize, num_constraints: usize) -> Self {
        Self {
            scheme,
            jacobian: Pattern::dense(num_constraints, num_variables),
            gradient: Pattern::dense(1, num_variables),
        }
    }
}

/// Evaluates an [`Nlp`] and its finite-difference derivatives.
///
/// Jacobian columns that share no rows in the sparsity pattern are perturbed
/// together, so a Jacobian costs one constraint evaluation per colour group
/// (two for central differences) instead of one per variable.
///
/// Evaluation counts are tracked for diagnostics.
pub struct Differentiator<'a, N> {
    nlp: &'a N,
    derivatives: &'a Derivatives,
    groups: Vec<Vec<usize>>,
    objective_evals: Cell<usize>,
    constraint_evals: Cell<usize>,
}

impl<'a, N: Nlp> Differentiator<'a, N> {
    #[must_use]
    pub fn new(nlp: &'a N, derivatives: &'a Derivatives) -> Self {
        Self {
            nlp,
            derivatives,
            groups: derivatives.jacobian.color_columns(),
            objective_evals: Cell::new(0),
            constraint_evals: Cell::new(0),
        }
    }

    #[must_use]
    pub fn nlp(&self) -> &N {
        self.nlp
    }

    /// Number of column groups used per Jacobian.
    #[must_use]
    pub fn num_colors(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn objective_evaluations(&self) -> usize {
        self.objective_evals.get()
    }

    #[must_use]
    pub fn constraint_evaluations(&self) -> usize {
        self.constraint_evals.get()
    }

    /// Evaluates the objective.
    ///
    /// # Errors
    ///
    /// Propagates any evaluation failure from the NLP.
    pub fn objective(&self, x: &[f64]) -> Result<f64, EvalError> {
        self.objective_evals.set(self.objective_evals.get() + 1);
        self.nlp.objective(x)
    }

    /// Evaluates every constraint row.
    ///
    /// # Errors
    ///
    /// Propagates any evaluation failure from the NLP.
    pub fn constraints(&self, x: &[f64]) -> Result<DVector<f64>, EvalError> {
        self.constraint_evals.set(self.constraint_evals.get() + 1);
        let mut g = DVector::zeros(self.nlp.num_constraints());
        self.nlp.constraints(x, g.as_mut_slice())?;
        Ok(g)
    }

    /// Finite-difference gradient of the objective.
    ///
    /// `f0` must be the objective at `x`. Entries outside the gradient
    /// pattern are zero.
    ///
    /// # Errors
    ///
    /// Propagates any evaluation failure from the NLP.
    pub fn gradient(&self, x: &[f64], f0: f64) -> Result<DVector<f64>, EvalError> {
        let scheme = self.derivatives.scheme;
        let mut grad = DVector::zeros(x.len());
        let mut work = x.to_vec();

        for (j, rows) in self.derivatives.gradient.columns().enumerate() {
            if rows.is_empty() {
                continue;
            }
            let h = scheme.step(x[j]);
            grad[j] = match scheme {
                FiniteDifference::Forward => {
                    work[j] = x[j] + h;
                    let f1 = self.objective(&work)?;
                    (f1 - f0) / h
                }
                FiniteDifference::Backward => {
                    work[j] = x[j] - h;
                    let f1 = self.objective(&work)?;
                    (f0 - f1) / h
                }
                FiniteDifference::Central => {
                    work[j] = x[j] + h;
                    let fp = self.objective(&work)?;
                    work[j] = x[j] - h;
                    let fm = self.objective(&work)?;
                    (fp - fm) / (2.0 * h)
                }
            };
            work[j] = x[j];
        }

        Ok(grad)
    }

    /// Finite-difference constraint Jacobian.
    ///
    /// `g0` must be the constraints at `x`. Entries outside the Jacobian
    /// pattern are zero.
    ///
    /// # Errors
    ///
    /// Propagates any evaluation failure from the NLP.
    pub fn jacobian(&self, x: &[f64], g0: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
        let scheme = self.derivatives.scheme;
        let pattern = &self.derivatives.jacobian;
        let mut jac = DMatrix::zeros(self.nlp.num_constraints(), x.len());
        let mut work = x.to_vec();

        for group in &self.groups {
            let steps: Vec<f64> = group.iter().map(|&j| scheme.step(x[j])).collect();

            let (plus, minus, divisor) = match scheme {
                FiniteDifference::Forward => {
                    let plus = self.perturbed(&mut work, x, group, &steps, 1.0)?;
                    (plus, g0.clone(), 1.0)
                }
                FiniteDifference::Backward => {
                    let minus = self.perturbed(&mut work, x, group, &steps, -1.0)?;
                    (g0.clone(), minus, 1.0)
                }
                FiniteDifference::Central => {
                    let plus = self.perturbed(&mut work, x, group, &steps, 1.0)?;
                    let minus = self.perturbed(&mut work, x, group, &steps, -1.0)?;
                    (plus, minus, 2.0)
                }
            };

            for (&j, &h) in group.iter().zip(&steps) {
                for &i in pattern.column(j) {
                    jac[(i, j)] = (plus[i] - minus[i]) / (divisor * h);
                }
            }
        }

        Ok(jac)
    }

    /// Evaluates constraints with every column in `group` shifted by `sign * step`.
    fn perturbed(
        &self,
        work: &mut [f64],
        x: &[f64],
        group: &[usize],
        steps: &[f64],
        sign: f64,
    ) -> Result<DVector<f64>, EvalError> {
        for (&j, &h) in group.iter().zip(steps) {
            work[j] = x[j] + sign * h;
        }
        let g = self.constraints(work);
        for &j in group {
            work[j] = x[j];
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use colloc_core::Bounds;

    /// f(x) = x0² + 3 x1, g(x) = [x0 x1, x2², x0 + x2]
    struct Quadratic {
        bounds: Vec<Bounds>,
        rows: Vec<Bounds>,
    }

    impl Quadratic {
        fn new() -> Self {
            Self {
                bounds: vec![Bounds::unbounded(); 3],
                rows: vec![Bounds::unbounded(); 3],
            }
        }
    }

    impl Nlp for Quadratic {
        fn variable_bounds(&self) -> &[Bounds] {
            &self.bounds
        }

        fn constraint_bounds(&self) -> &[Bounds] {
            &self.rows
        }

        fn objective(&self, x: &[f64]) -> Result<f64, EvalError> {
            Ok(x[0] * x[0] + 3.0 * x[1])
        }

        fn constraints(&self, x: &[f64], g: &mut [f64]) -> Result<(), EvalError> {
            g[0] = x[0] * x[1];
            g[1] = x[2] * x[2];
            g[2] = x[0] + x[2];
            Ok(())
        }
    }

    fn check_scheme(scheme: FiniteDifference, epsilon: f64) {
        let nlp = Quadratic::new();
        let derivatives = Derivatives::dense(scheme, 3, 3);
        let diff = Differentiator::new(&nlp, &derivatives);
        let x = [1.5, -2.0, 0.5];

        let f0 = diff.objective(&x).unwrap();
        let grad = diff.gradient(&x, f0).unwrap();
        assert_relative_eq!(grad[0], 3.0, epsilon = epsilon);
        assert_relative_eq!(grad[1], 3.0, epsilon = epsilon);
        assert_relative_eq!(grad[2], 0.0, epsilon = epsilon);

        let g0 = diff.constraints(&x).unwrap();
        let jac = diff.jacobian(&x, &g0).unwrap();
        let expected = DMatrix::from_row_slice(3, 3, &[-2.0, 1.5, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        for (a, b) in jac.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = epsilon);
        }
    }

    #[test]
    fn central_differences_are_accurate() {
        check_scheme(FiniteDifference::Central, 1e-8);
    }

    #[test]
    fn one_sided_differences_are_accurate() {
        check_scheme(FiniteDifference::Forward, 1e-6);
        check_scheme(FiniteDifference::Backward, 1e-6);
    }

    #[test]
    fn sparse_pattern_groups_columns() {
        let nlp = Quadratic::new();
        let jacobian =
            Pattern::from_entries(3, 3, [(0, 0), (0, 1), (1, 2), (2, 0), (2, 2)]);
        let derivatives = Derivatives {
            scheme: FiniteDifference::Forward,
            jacobian,
            gradient: Pattern::from_entries(1, 3, [(0, 0), (0, 1)]),
        };
        let diff = Differentiator::new(&nlp, &derivatives);
        let x = [1.0, 1.0, 1.0];

        let f0 = diff.objective(&x).unwrap();
        let grad = diff.gradient(&x, f0).unwrap();
        assert_eq!(diff.objective_evaluations(), 3);
        assert_eq!(grad[2], 0.0);

        let g0 = diff.constraints(&x).unwrap();
        let jac = diff.jacobian(&x, &g0).unwrap();
        assert_eq!(diff.constraint_evaluations(), 1 + diff.num_colors());
        assert_relative_eq!(jac[(1, 2)], 2.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(2, 0)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn scheme_names() {
        assert_eq!("central".parse(), Ok(FiniteDifference::Central));
        assert_eq!("forward".parse(), Ok(FiniteDifference::Forward));
        assert_eq!("backward".parse(), Ok(FiniteDifference::Backward));
        assert!("complex-step".parse::<FiniteDifference>().is_err());
    }
}
