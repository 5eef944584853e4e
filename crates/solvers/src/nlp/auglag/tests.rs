use approx::assert_relative_eq;

use colloc_core::Bounds;

use crate::nlp::{Derivatives, EvalError, FiniteDifference, Nlp, Status};

use super::{
    Action, Config, Error, Event, HessianApproximation, minimize, minimize_unobserved,
};

/// A small NLP assembled from closures.
struct Closures<F, G> {
    variables: Vec<Bounds>,
    rows: Vec<Bounds>,
    objective: F,
    constraints: G,
}

impl<F, G> Nlp for Closures<F, G>
where
    F: Fn(&[f64]) -> f64,
    G: Fn(&[f64], &mut [f64]),
{
    fn variable_bounds(&self) -> &[Bounds] {
        &self.variables
    }

    fn constraint_bounds(&self) -> &[Bounds] {
        &self.rows
    }

    fn objective(&self, x: &[f64]) -> Result<f64, EvalError> {
        Ok((self.objective)(x))
    }

    fn constraints(&self, x: &[f64], g: &mut [f64]) -> Result<(), EvalError> {
        (self.constraints)(x, g);
        Ok(())
    }
}

fn bounds(lower: f64, upper: f64) -> Bounds {
    Bounds::new(lower, upper).unwrap()
}

fn dense<N: Nlp>(nlp: &N) -> Derivatives {
    Derivatives::dense(
        FiniteDifference::Central,
        nlp.num_variables(),
        nlp.num_constraints(),
    )
}

#[test]
fn respects_variable_bounds() {
    let nlp = Closures {
        variables: vec![bounds(0.0, 1.0); 2],
        rows: vec![],
        objective: |x: &[f64]| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
        constraints: |_: &[f64], _: &mut [f64]| {},
    };

    let solution =
        minimize_unobserved(&nlp, &dense(&nlp), &[0.5, 0.5], &Config::default()).unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(solution.x[1], 0.0, epsilon = 1e-8);
    assert_relative_eq!(solution.objective, 2.0, epsilon = 1e-8);
}

#[test]
fn solves_rosenbrock() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded(); 2],
        rows: vec![],
        objective: |x: &[f64]| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2),
        constraints: |_: &[f64], _: &mut [f64]| {},
    };

    let solution =
        minimize_unobserved(&nlp, &dense(&nlp), &[-1.2, 1.0], &Config::default()).unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], 1.0, epsilon = 1e-4);
}

#[test]
fn equality_constraint_and_multiplier() {
    // Minimize x² + y² subject to x + y = 1.
    let nlp = Closures {
        variables: vec![Bounds::unbounded(); 2],
        rows: vec![Bounds::fixed(1.0).unwrap()],
        objective: |x: &[f64]| x[0] * x[0] + x[1] * x[1],
        constraints: |x: &[f64], g: &mut [f64]| g[0] = x[0] + x[1],
    };

    let solution =
        minimize_unobserved(&nlp, &dense(&nlp), &[0.0, 0.0], &Config::default()).unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert!(solution.infeasibility <= 1e-8);
    assert_relative_eq!(solution.x[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(solution.x[1], 0.5, epsilon = 1e-6);
    assert_relative_eq!(solution.multipliers[0], -1.0, epsilon = 1e-4);
}

#[test]
fn ranged_constraint_becomes_active() {
    // Minimize (x - 3)² subject to -1 <= x <= 1 as a constraint row.
    let nlp = Closures {
        variables: vec![Bounds::unbounded()],
        rows: vec![bounds(-1.0, 1.0)],
        objective: |x: &[f64]| (x[0] - 3.0).powi(2),
        constraints: |x: &[f64], g: &mut [f64]| g[0] = x[0],
    };

    let solution = minimize_unobserved(&nlp, &dense(&nlp), &[0.0], &Config::default()).unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(solution.multipliers[0], 4.0, epsilon = 1e-4);
}

#[test]
fn inactive_ranged_constraint_has_zero_multiplier() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded()],
        rows: vec![bounds(-1.0, 1.0)],
        objective: |x: &[f64]| (x[0] - 0.25).powi(2),
        constraints: |x: &[f64], g: &mut [f64]| g[0] = x[0],
    };

    let solution = minimize_unobserved(&nlp, &dense(&nlp), &[0.0], &Config::default()).unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 0.25, epsilon = 1e-6);
    assert_eq!(solution.multipliers[0], 0.0);
}

#[test]
fn limited_memory_converges() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded(); 2],
        rows: vec![Bounds::fixed(1.0).unwrap()],
        objective: |x: &[f64]| x[0] * x[0] + 2.0 * x[1] * x[1],
        constraints: |x: &[f64], g: &mut [f64]| g[0] = x[0] + x[1],
    };
    let config = Config::default().with_hessian_approximation(HessianApproximation::LimitedMemory);

    let solution = minimize_unobserved(&nlp, &dense(&nlp), &[0.0, 0.0], &config).unwrap();

    // Optimum of x² + 2y² on x + y = 1 is (2/3, 1/3).
    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.x[0], 2.0 / 3.0, epsilon = 1e-5);
    assert_relative_eq!(solution.x[1], 1.0 / 3.0, epsilon = 1e-5);
}

#[test]
fn contradictory_constraints_are_infeasible() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded()],
        rows: vec![Bounds::fixed(1.0).unwrap(), Bounds::fixed(2.0).unwrap()],
        objective: |x: &[f64]| x[0] * x[0],
        constraints: |x: &[f64], g: &mut [f64]| {
            g[0] = x[0];
            g[1] = x[0];
        },
    };
    let config = Config::default().with_penalty(10.0, 10.0, 1e4).unwrap();

    let solution = minimize_unobserved(&nlp, &dense(&nlp), &[0.0], &config).unwrap();

    assert_eq!(solution.status, Status::Infeasible);
    assert_relative_eq!(solution.infeasibility, 0.5, epsilon = 1e-3);
}

#[test]
fn observer_can_stop_early() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded(); 2],
        rows: vec![Bounds::fixed(1.0).unwrap()],
        objective: |x: &[f64]| x[0] * x[0] + x[1] * x[1],
        constraints: |x: &[f64], g: &mut [f64]| g[0] = x[0] + x[1],
    };

    let mut seen = Vec::new();
    let observer = |event: &Event<'_>| {
        seen.push((event.iteration, event.penalty));
        (event.iteration == 2).then_some(Action::StopEarly)
    };

    let solution = minimize(&nlp, &dense(&nlp), &[0.0, 0.0], &Config::default(), observer)
        .unwrap();

    assert_eq!(solution.status, Status::StoppedByObserver);
    assert_eq!(solution.iterations, 2);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (1, 10.0));
}

#[test]
fn iteration_limit_is_reported() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded(); 2],
        rows: vec![Bounds::fixed(1.0).unwrap()],
        objective: |x: &[f64]| x[0] * x[0] + x[1] * x[1],
        constraints: |x: &[f64], g: &mut [f64]| g[0] = x[0] + x[1],
    };
    let config = Config::new(1, 1e-6, 1e-8).unwrap();

    let solution = minimize_unobserved(&nlp, &dense(&nlp), &[0.0, 0.0], &config).unwrap();

    assert_eq!(solution.status, Status::MaxIterations);
    assert_eq!(solution.iterations, 1);
    assert!(solution.objective_evaluations > 0);
    assert!(solution.constraint_evaluations > 0);
}

#[test]
fn wrong_initial_point_length() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded(); 2],
        rows: vec![],
        objective: |x: &[f64]| x[0],
        constraints: |_: &[f64], _: &mut [f64]| {},
    };

    let result = minimize_unobserved(&nlp, &dense(&nlp), &[0.0], &Config::default());

    assert!(matches!(
        result,
        Err(Error::Dimension {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn non_finite_start_is_an_error() {
    let nlp = Closures {
        variables: vec![Bounds::unbounded()],
        rows: vec![],
        objective: |x: &[f64]| x[0].ln(),
        constraints: |_: &[f64], _: &mut [f64]| {},
    };

    let result = minimize_unobserved(&nlp, &dense(&nlp), &[-1.0], &Config::default());

    assert!(matches!(result, Err(Error::NonFinite)));
}

#[derive(Debug, thiserror::Error)]
#[error("outside the model's domain")]
struct OutsideDomain;

/// `(x - 2)²` on `[0, 5]`, undefined beyond `x = 1.5`.
struct Fragile {
    variables: Vec<Bounds>,
}

impl Nlp for Fragile {
    fn variable_bounds(&self) -> &[Bounds] {
        &self.variables
    }

    fn constraint_bounds(&self) -> &[Bounds] {
        &[]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, EvalError> {
        if x[0] > 1.5 {
            return Err(Box::new(OutsideDomain));
        }
        Ok((x[0] - 2.0).powi(2))
    }

    fn constraints(&self, _x: &[f64], _g: &mut [f64]) -> Result<(), EvalError> {
        Ok(())
    }
}

#[test]
fn failing_trial_point_aborts_the_solve() {
    let nlp = Fragile {
        variables: vec![bounds(0.0, 5.0)],
    };

    let result = minimize_unobserved(&nlp, &dense(&nlp), &[0.5], &Config::default());

    let Err(Error::Evaluation(error)) = result else {
        panic!("expected an evaluation error");
    };
    assert!(error.is::<OutsideDomain>());
}
