//! Weighted cost terms for assembling a problem's objective.
//!
//! A [`Problem`](crate::Problem) exposes a single integrand and a single
//! endpoint cost. When the objective is a sum of several weighted terms, a
//! [`Costs`] collection can produce both:
//!
//! ```rust
//! use colloc_core::cost::{ControlEffortCost, Costs, FinalTimeCost};
//!
//! let costs = Costs::new()
//!     .with(ControlEffortCost::new(1.0))
//!     .with(FinalTimeCost::new(0.1));
//! # let _ = costs;
//! ```

use crate::TimePoint;

/// A term of the objective functional.
///
/// Each term may contribute to the integral cost, the endpoint cost, or
/// both. The returned values exclude the weight; [`Costs`] applies it.
pub trait Cost: Send + Sync {
    /// Multiplier applied to this term's contributions.
    fn weight(&self) -> f64;

    /// Integrand evaluated at every grid point.
    fn integrand(&self, _point: &TimePoint<'_>) -> f64 {
        0.0
    }

    /// Cost of the final point.
    fn endpoint(&self, _final_point: &TimePoint<'_>) -> f64 {
        0.0
    }
}

/// Endpoint cost equal to the final time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalTimeCost {
    pub weight: f64,
}

impl FinalTimeCost {
    #[must_use]
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Cost for FinalTimeCost {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn endpoint(&self, final_point: &TimePoint<'_>) -> f64 {
        final_point.time
    }
}

/// Integral of the sum of squared controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlEffortCost {
    pub weight: f64,
}

impl ControlEffortCost {
    #[must_use]
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Cost for ControlEffortCost {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn integrand(&self, point: &TimePoint<'_>) -> f64 {
        point.controls.iter().map(|u| u * u).sum()
    }
}

/// Squared distance between selected final states and a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointTargetCost {
    pub weight: f64,

    /// Index of each targeted state, paired with `reference`.
    pub states: Vec<usize>,

    pub reference: Vec<f64>,
}

impl EndpointTargetCost {
    /// Creates a target cost from `(state index, reference value)` pairs.
    pub fn new(weight: f64, targets: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let (states, reference) = targets.into_iter().unzip();
        Self {
            weight,
            states,
            reference,
        }
    }
}

impl Cost for EndpointTargetCost {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn endpoint(&self, final_point: &TimePoint<'_>) -> f64 {
        self.states
            .iter()
            .zip(&self.reference)
            .map(|(&i, target)| {
                let error = final_point.states[i] - target;
                error * error
            })
            .sum()
    }
}

/// A weighted sum of cost terms.
#[derive(Default)]
pub struct Costs {
    terms: Vec<Box<dyn Cost>>,
}

impl Costs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a term.
    #[must_use]
    pub fn with(mut self, term: impl Cost + 'static) -> Self {
        self.terms.push(Box::new(term));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Weighted sum of every term's integrand.
    #[must_use]
    pub fn integrand(&self, point: &TimePoint<'_>) -> f64 {
        self.terms
            .iter()
            .map(|term| term.weight() * term.integrand(point))
            .sum()
    }

    /// Weighted sum of every term's endpoint cost.
    #[must_use]
    pub fn endpoint(&self, final_point: &TimePoint<'_>) -> f64 {
        self.terms
            .iter()
            .map(|term| term.weight() * term.endpoint(final_point))
            .sum()
    }
}

impl std::fmt::Debug for Costs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Costs")
            .field("terms", &self.terms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn point<'a>(time: f64, states: &'a [f64], controls: &'a [f64]) -> TimePoint<'a> {
        TimePoint {
            time,
            states,
            controls,
            multipliers: &[],
            derivatives: &[],
            parameters: &[],
        }
    }

    #[test]
    fn weighted_terms_are_summed() {
        let costs = Costs::new()
            .with(ControlEffortCost::new(2.0))
            .with(FinalTimeCost::new(0.5))
            .with(EndpointTargetCost::new(10.0, [(1, 1.0)]));

        let p = point(3.0, &[0.0, 0.5], &[1.0, -2.0]);

        assert_eq!(costs.len(), 3);
        assert_relative_eq!(costs.integrand(&p), 2.0 * 5.0);
        assert_relative_eq!(costs.endpoint(&p), 0.5 * 3.0 + 10.0 * 0.25);
    }

    #[test]
    fn empty_costs_are_zero() {
        let costs = Costs::new();
        let p = point(1.0, &[1.0], &[1.0]);

        assert!(costs.is_empty());
        assert_relative_eq!(costs.integrand(&p), 0.0);
        assert_relative_eq!(costs.endpoint(&p), 0.0);
    }
}
