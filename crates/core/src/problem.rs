use std::{fmt, str::FromStr};

use crate::Bounds;

/// How a [`Problem`] expresses its dynamics.
///
/// In explicit mode the dynamics return state rates directly. In implicit
/// mode the problem also declares [`Derivative`] decision variables and
/// returns residuals that must vanish at every grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum DynamicsMode {
    #[default]
    Explicit,
    Implicit,
}

impl DynamicsMode {
    /// Returns the canonical name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        }
    }
}

impl fmt::Display for DynamicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DynamicsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            other => Err(format!("unknown dynamics mode '{other}'")),
        }
    }
}

/// A time-varying or static decision variable declared by a problem.
///
/// `initial_bounds` and `final_bounds` override `bounds` at the first and
/// last grid point. They are ignored for parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub bounds: Bounds,
    pub initial_bounds: Option<Bounds>,
    pub final_bounds: Option<Bounds>,
}

impl Variable {
    /// Creates a variable with the given bounds over the whole horizon.
    pub fn new(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            bounds,
            initial_bounds: None,
            final_bounds: None,
        }
    }

    #[must_use]
    pub fn with_initial_bounds(mut self, bounds: Bounds) -> Self {
        self.initial_bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn with_final_bounds(mut self, bounds: Bounds) -> Self {
        self.final_bounds = Some(bounds);
        self
    }
}

/// A named constraint row with its admissible range.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub bounds: Bounds,
}

impl Constraint {
    pub fn new(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// What an implicit-mode derivative variable represents.
///
/// The kind selects which solver-level bounds apply to the variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeKind {
    /// A generalized acceleration of a multibody system.
    Acceleration,

    /// The time derivative of an auxiliary component state.
    ComponentDerivative,
}

/// A derivative decision variable that exists only in implicit mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivative {
    pub name: String,
    pub kind: DerivativeKind,
}

impl Derivative {
    pub fn new(name: impl Into<String>, kind: DerivativeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A borrowed snapshot of every decision variable at one instant.
///
/// Slices follow the order the problem declares its variables in.
/// `derivatives` is empty in explicit mode.
#[derive(Debug, Clone, Copy)]
pub struct TimePoint<'a> {
    pub time: f64,
    pub states: &'a [f64],
    pub controls: &'a [f64],
    pub multipliers: &'a [f64],
    pub derivatives: &'a [f64],
    pub parameters: &'a [f64],
}

/// The result of evaluating a problem's dynamics at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dynamics {
    /// Time derivative of every state.
    pub state_rates: Vec<f64>,

    /// Implicit-mode residuals, one per derivative variable.
    ///
    /// Must be empty in explicit mode.
    pub residuals: Vec<f64>,
}

impl Dynamics {
    /// Creates explicit-mode dynamics from state rates alone.
    #[must_use]
    pub fn explicit(state_rates: Vec<f64>) -> Self {
        Self {
            state_rates,
            residuals: Vec::new(),
        }
    }

    /// Creates implicit-mode dynamics from state rates and residuals.
    #[must_use]
    pub fn implicit(state_rates: Vec<f64>, residuals: Vec<f64>) -> Self {
        Self {
            state_rates,
            residuals,
        }
    }
}

/// Defines a continuous-time optimal-control problem.
///
/// A problem declares its decision variables with their bounds and provides
/// the callables a transcription evaluates at each grid point: dynamics,
/// the integral-cost integrand, the endpoint cost, and path and boundary
/// constraints.
///
/// The transcription may evaluate these callables concurrently from several
/// threads and in any order across grid points, so implementations must not
/// rely on shared mutable state. A problem is borrowed for the lifetime of a
/// solver and is never mutated by it.
pub trait Problem: Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the dynamics mode.
    ///
    /// The default is [`DynamicsMode::Explicit`].
    fn dynamics_mode(&self) -> DynamicsMode {
        DynamicsMode::Explicit
    }

    /// Bounds on the initial time.
    fn initial_time_bounds(&self) -> Bounds;

    /// Bounds on the final time.
    fn final_time_bounds(&self) -> Bounds;

    fn states(&self) -> &[Variable];

    fn controls(&self) -> &[Variable];

    /// Algebraic multipliers, for example kinematic-constraint forces.
    fn multipliers(&self) -> &[Variable] {
        &[]
    }

    /// Static parameters that are optimized alongside the trajectory.
    fn parameters(&self) -> &[Variable] {
        &[]
    }

    /// Derivative variables, consulted only in implicit mode.
    fn derivatives(&self) -> &[Derivative] {
        &[]
    }

    /// Path constraint rows, evaluated at every mesh point.
    fn path_constraints(&self) -> &[Constraint] {
        &[]
    }

    /// Boundary constraint rows, evaluated once on the endpoints.
    fn boundary_constraints(&self) -> &[Constraint] {
        &[]
    }

    /// Evaluates the dynamics at a point in time.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the dynamics cannot be evaluated.
    fn dynamics(&self, point: &TimePoint<'_>) -> Result<Dynamics, Self::Error>;

    /// Evaluates the integrand of the integral cost.
    ///
    /// The default integrand is zero.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the integrand cannot be evaluated.
    fn integral_cost(&self, _point: &TimePoint<'_>) -> Result<f64, Self::Error> {
        Ok(0.0)
    }

    /// Evaluates the cost of the final point.
    ///
    /// The default endpoint cost is zero.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the cost cannot be evaluated.
    fn endpoint_cost(&self, _final_point: &TimePoint<'_>) -> Result<f64, Self::Error> {
        Ok(0.0)
    }

    /// Evaluates the path constraint rows at a point in time.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the constraints cannot be evaluated.
    fn path_constraint(&self, _point: &TimePoint<'_>) -> Result<Vec<f64>, Self::Error> {
        Ok(Vec::new())
    }

    /// Evaluates the boundary constraint rows.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the constraints cannot be evaluated.
    fn boundary_constraint(
        &self,
        _initial_point: &TimePoint<'_>,
        _final_point: &TimePoint<'_>,
    ) -> Result<Vec<f64>, Self::Error> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamics_mode_names() {
        assert_eq!("implicit".parse(), Ok(DynamicsMode::Implicit));
        assert_eq!("explicit".parse(), Ok(DynamicsMode::Explicit));
        assert!("semi-implicit".parse::<DynamicsMode>().is_err());
        assert_eq!(DynamicsMode::default().to_string(), "explicit");
    }

    #[test]
    fn variable_builders_set_endpoint_bounds() {
        let zero = Bounds::fixed(0.0).unwrap();
        let var = Variable::new("x", Bounds::new(-1.0, 1.0).unwrap())
            .with_initial_bounds(zero)
            .with_final_bounds(zero);

        assert_eq!(var.name, "x");
        assert_eq!(var.initial_bounds, Some(zero));
        assert_eq!(var.final_bounds, Some(zero));
    }
}
