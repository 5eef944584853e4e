use thiserror::Error;

/// A feasible `[lower, upper]` range for a scalar quantity.
///
/// Unbounded sides are represented by `f64::NEG_INFINITY` and
/// `f64::INFINITY`. A `Bounds` is validated on construction and immutable
/// afterwards, so `lower <= upper` always holds and neither side is NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "[f64; 2]", into = "[f64; 2]")
)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

/// Errors that can occur when constructing [`Bounds`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BoundsError {
    #[error("bounds cannot contain NaN")]
    NotANumber,

    #[error("lower bound {lower} exceeds upper bound {upper}")]
    Inverted { lower: f64, upper: f64 },
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bounds {
    /// Bounds that pin a quantity to zero, as for equality constraint rows.
    pub const ZERO: Self = Self {
        lower: 0.0,
        upper: 0.0,
    };

    /// Creates bounds from a lower and an upper value.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is NaN or `lower > upper`.
    pub fn new(lower: f64, upper: f64) -> Result<Self, BoundsError> {
        if lower.is_nan() || upper.is_nan() {
            return Err(BoundsError::NotANumber);
        }
        if lower > upper {
            return Err(BoundsError::Inverted { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// Creates bounds that pin a quantity to a single value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is NaN.
    pub fn fixed(value: f64) -> Result<Self, BoundsError> {
        Self::new(value, value)
    }

    /// Creates bounds with a finite or infinite lower side only.
    ///
    /// # Errors
    ///
    /// Returns an error if `lower` is NaN.
    pub fn at_least(lower: f64) -> Result<Self, BoundsError> {
        Self::new(lower, f64::INFINITY)
    }

    /// Creates bounds with an upper side only.
    ///
    /// # Errors
    ///
    /// Returns an error if `upper` is NaN.
    pub fn at_most(upper: f64) -> Result<Self, BoundsError> {
        Self::new(f64::NEG_INFINITY, upper)
    }

    /// Creates bounds that admit every real value.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    #[must_use]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Returns `true` if lower and upper coincide.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    /// Returns `true` if both sides are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    /// Returns `true` if `value` lies within the bounds.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Clamps `value` into the bounds.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    /// Returns a deterministic representative value inside the bounds.
    ///
    /// This is the midpoint for finite bounds, and zero clamped into the
    /// range when either side is infinite.
    #[must_use]
    pub fn midpoint_guess(&self) -> f64 {
        if self.is_finite() {
            0.5 * (self.lower + self.upper)
        } else {
            self.clamp(0.0)
        }
    }
}

impl TryFrom<[f64; 2]> for Bounds {
    type Error = BoundsError;

    fn try_from([lower, upper]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lower, upper)
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(bounds: Bounds) -> Self {
        [bounds.lower, bounds.upper]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn rejects_inverted_and_nan() {
        assert_eq!(
            Bounds::new(1.0, -1.0),
            Err(BoundsError::Inverted {
                lower: 1.0,
                upper: -1.0
            })
        );
        assert_eq!(Bounds::new(f64::NAN, 1.0), Err(BoundsError::NotANumber));
    }

    #[test]
    fn midpoint_guess_of_finite_bounds() {
        let bounds = Bounds::new(-1.0, 3.0).unwrap();
        assert_relative_eq!(bounds.midpoint_guess(), 1.0);
        assert!(bounds.is_finite());
        assert!(!bounds.is_fixed());
    }

    #[test]
    fn midpoint_guess_of_half_bounded_clamps_zero() {
        let above = Bounds::at_least(2.0).unwrap();
        assert_relative_eq!(above.midpoint_guess(), 2.0);

        let below = Bounds::at_most(-5.0).unwrap();
        assert_relative_eq!(below.midpoint_guess(), -5.0);

        let straddling = Bounds::at_least(-5.0).unwrap();
        assert_relative_eq!(straddling.midpoint_guess(), 0.0);

        assert_relative_eq!(Bounds::unbounded().midpoint_guess(), 0.0);
    }

    #[test]
    fn fixed_bounds_contain_only_their_value() {
        let bounds = Bounds::fixed(0.5).unwrap();
        assert!(bounds.is_fixed());
        assert!(bounds.contains(0.5));
        assert!(!bounds.contains(0.5 + 1e-12));
        assert_relative_eq!(bounds.clamp(7.0), 0.5);
    }
}
