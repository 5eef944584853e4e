//! Small optimal-control problems with known solutions.

use std::convert::Infallible;

use colloc_core::{
    Bounds, Constraint, Derivative, DerivativeKind, Dynamics, DynamicsMode, Problem, TimePoint, Variable,
    cost::{ControlEffortCost, Costs, FinalTimeCost},
};

fn bounds(lower: f64, upper: f64) -> Bounds {
    Bounds::new(lower, upper).unwrap()
}

fn fixed(value: f64) -> Bounds {
    Bounds::fixed(value).unwrap()
}

/// `x' = u` from `x(0) = 0` with `x ∈ [-10, 10]` and `u ∈ [-1, 1]`.
///
/// The objective is assembled from [`Costs`], so the same dynamics serve a
/// minimum-effort and a minimum-time problem.
pub struct Integrator {
    states: Vec<Variable>,
    controls: Vec<Variable>,
    final_time: Bounds,
    costs: Costs,
}

impl Integrator {
    /// Minimum effort on `[0, 1]` with a free final state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: vec![Variable::new("x", bounds(-10.0, 10.0)).with_initial_bounds(fixed(0.0))],
            controls: vec![Variable::new("u", bounds(-1.0, 1.0))],
            final_time: fixed(1.0),
            costs: Costs::new().with(ControlEffortCost::new(1.0)),
        }
    }

    /// Minimum effort on `[0, 1]` ending at `x(1) = target`.
    #[must_use]
    pub fn reaching(target: f64) -> Self {
        let mut problem = Self::new();
        problem.states[0].final_bounds = Some(fixed(target));
        problem
    }

    /// Minimum final time ending at `x(tf) = target`.
    #[must_use]
    pub fn minimum_time(target: f64, final_time: Bounds) -> Self {
        Self {
            final_time,
            costs: Costs::new().with(FinalTimeCost::new(1.0)),
            ..Self::reaching(target)
        }
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for Integrator {
    type Error = Infallible;

    fn initial_time_bounds(&self) -> Bounds {
        fixed(0.0)
    }

    fn final_time_bounds(&self) -> Bounds {
        self.final_time
    }

    fn states(&self) -> &[Variable] {
        &self.states
    }

    fn controls(&self) -> &[Variable] {
        &self.controls
    }

    fn dynamics(&self, point: &TimePoint<'_>) -> Result<Dynamics, Infallible> {
        Ok(Dynamics::explicit(vec![point.controls[0]]))
    }

    fn integral_cost(&self, point: &TimePoint<'_>) -> Result<f64, Infallible> {
        Ok(self.costs.integrand(point))
    }

    fn endpoint_cost(&self, final_point: &TimePoint<'_>) -> Result<f64, Infallible> {
        Ok(self.costs.endpoint(final_point))
    }
}

/// A unit point mass moved from rest at 0 to rest at 1 in unit time.
///
/// The dynamics are implicit: the acceleration is a decision variable and
/// the residual `a - u` ties it to the force. The minimum-effort force is
/// `u(t) = 6 - 12 t` with cost 12.
pub struct PointMass {
    states: Vec<Variable>,
    controls: Vec<Variable>,
    derivatives: Vec<Derivative>,
}

impl PointMass {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: vec![
                Variable::new("x", bounds(-5.0, 5.0))
                    .with_initial_bounds(fixed(0.0))
                    .with_final_bounds(fixed(1.0)),
                Variable::new("v", bounds(-5.0, 5.0))
                    .with_initial_bounds(fixed(0.0))
                    .with_final_bounds(fixed(0.0)),
            ],
            controls: vec![Variable::new("u", bounds(-50.0, 50.0))],
            derivatives: vec![Derivative::new("a", DerivativeKind::Acceleration)],
        }
    }
}

impl Default for PointMass {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for PointMass {
    type Error = Infallible;

    fn dynamics_mode(&self) -> DynamicsMode {
        DynamicsMode::Implicit
    }

    fn initial_time_bounds(&self) -> Bounds {
        fixed(0.0)
    }

    fn final_time_bounds(&self) -> Bounds {
        fixed(1.0)
    }

    fn states(&self) -> &[Variable] {
        &self.states
    }

    fn controls(&self) -> &[Variable] {
        &self.controls
    }

    fn derivatives(&self) -> &[Derivative] {
        &self.derivatives
    }

    fn dynamics(&self, point: &TimePoint<'_>) -> Result<Dynamics, Infallible> {
        let velocity = point.states[1];
        let acceleration = point.derivatives[0];
        Ok(Dynamics::implicit(
            vec![velocity, acceleration],
            vec![acceleration - point.controls[0]],
        ))
    }

    fn integral_cost(&self, point: &TimePoint<'_>) -> Result<f64, Infallible> {
        Ok(point.controls[0] * point.controls[0])
    }
}

/// `x' = p` for a static rate `p`, with `x(0) = 0` and `x(1) = 2`.
///
/// The endpoint cost `(p - 3)²` pulls the rate away from the only feasible
/// value `p = 2`, and a path constraint keeps `x <= 2` along the way.
pub struct ConstantRate {
    states: Vec<Variable>,
    parameters: Vec<Variable>,
    path: Vec<Constraint>,
}

impl ConstantRate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: vec![
                Variable::new("x", Bounds::unbounded())
                    .with_initial_bounds(fixed(0.0))
                    .with_final_bounds(fixed(2.0)),
            ],
            parameters: vec![Variable::new("rate", bounds(0.0, 10.0))],
            path: vec![Constraint::new(
                "ceiling",
                Bounds::at_most(2.0).unwrap(),
            )],
        }
    }
}

impl Default for ConstantRate {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for ConstantRate {
    type Error = Infallible;

    fn initial_time_bounds(&self) -> Bounds {
        fixed(0.0)
    }

    fn final_time_bounds(&self) -> Bounds {
        fixed(1.0)
    }

    fn states(&self) -> &[Variable] {
        &self.states
    }

    fn controls(&self) -> &[Variable] {
        &[]
    }

    fn parameters(&self) -> &[Variable] {
        &self.parameters
    }

    fn path_constraints(&self) -> &[Constraint] {
        &self.path
    }

    fn dynamics(&self, point: &TimePoint<'_>) -> Result<Dynamics, Infallible> {
        Ok(Dynamics::explicit(vec![point.parameters[0]]))
    }

    fn endpoint_cost(&self, final_point: &TimePoint<'_>) -> Result<f64, Infallible> {
        let error = final_point.parameters[0] - 3.0;
        Ok(error * error)
    }

    fn path_constraint(&self, point: &TimePoint<'_>) -> Result<Vec<f64>, Infallible> {
        Ok(vec![point.states[0]])
    }
}
