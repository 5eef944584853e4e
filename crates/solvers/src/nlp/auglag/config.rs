use thiserror::Error;

use crate::nlp::{Options, OptionsError};

use super::HessianApproximation;

/// Configuration for the augmented Lagrangian solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iterations: usize,
    max_inner_iterations: usize,
    tolerance: f64,
    constraint_tolerance: f64,
    initial_penalty: f64,
    penalty_growth: f64,
    max_penalty: f64,
    hessian_approximation: HessianApproximation,
}

/// Errors that can occur when validating an augmented Lagrangian config.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("tolerance must be finite and positive")]
    Tolerance,

    #[error("constraint_tolerance must be finite and positive")]
    ConstraintTolerance,

    #[error("initial_penalty must be finite and positive")]
    InitialPenalty,

    #[error("penalty_growth must be finite and greater than 1")]
    PenaltyGrowth,

    #[error("max_penalty must be finite and at least initial_penalty")]
    MaxPenalty,

    #[error("hessian_approximation must be 'exact' or 'limited-memory', got '{0}'")]
    HessianApproximation(String),

    #[error(transparent)]
    Options(#[from] OptionsError),
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(100, 1e-6, 1e-8)
            .and_then(|config| config.with_penalty(10.0, 10.0, 1e12))
            .unwrap()
    }
}

impl Config {
    /// Option keys understood by [`Config::from_options`].
    pub const KEYS: [&'static str; 8] = [
        "max_iterations",
        "max_inner_iterations",
        "tolerance",
        "constraint_tolerance",
        "initial_penalty",
        "penalty_growth",
        "max_penalty",
        "hessian_approximation",
    ];

    /// Creates a config with validated tolerances and default penalties.
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance is non-positive or non-finite.
    pub fn new(
        max_iterations: usize,
        tolerance: f64,
        constraint_tolerance: f64,
    ) -> Result<Self, ConfigError> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ConfigError::Tolerance);
        }
        if !constraint_tolerance.is_finite() || constraint_tolerance <= 0.0 {
            return Err(ConfigError::ConstraintTolerance);
        }

        Ok(Self {
            max_iterations,
            max_inner_iterations: 200,
            tolerance,
            constraint_tolerance,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e12,
            hessian_approximation: HessianApproximation::Exact,
        })
    }

    /// Sets the penalty schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial` is not positive, `growth` is not greater
    /// than one, or `max` is less than `initial`.
    pub fn with_penalty(self, initial: f64, growth: f64, max: f64) -> Result<Self, ConfigError> {
        if !initial.is_finite() || initial <= 0.0 {
            return Err(ConfigError::InitialPenalty);
        }
        if !growth.is_finite() || growth <= 1.0 {
            return Err(ConfigError::PenaltyGrowth);
        }
        if !max.is_finite() || max < initial {
            return Err(ConfigError::MaxPenalty);
        }

        Ok(Self {
            initial_penalty: initial,
            penalty_growth: growth,
            max_penalty: max,
            ..self
        })
    }

    #[must_use]
    pub fn with_max_inner_iterations(self, max_inner_iterations: usize) -> Self {
        Self {
            max_inner_iterations,
            ..self
        }
    }

    #[must_use]
    pub fn with_hessian_approximation(self, hessian_approximation: HessianApproximation) -> Self {
        Self {
            hessian_approximation,
            ..self
        }
    }

    /// Builds a config from a backend options dictionary.
    ///
    /// Missing keys keep their default values.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown keys, mistyped values, or values that
    /// fail validation.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        options.check_keys(&Self::KEYS)?;
        let defaults = Self::default();

        let hessian_approximation = match options.get_str("hessian_approximation")? {
            Some(name) => name
                .parse()
                .map_err(ConfigError::HessianApproximation)?,
            None => defaults.hessian_approximation,
        };
        let max_inner_iterations = options
            .get_usize("max_inner_iterations")?
            .unwrap_or(defaults.max_inner_iterations);

        let config = Self::new(
            options
                .get_usize("max_iterations")?
                .unwrap_or(defaults.max_iterations),
            options.get_f64("tolerance")?.unwrap_or(defaults.tolerance),
            options
                .get_f64("constraint_tolerance")?
                .unwrap_or(defaults.constraint_tolerance),
        )?
        .with_penalty(
            options
                .get_f64("initial_penalty")?
                .unwrap_or(defaults.initial_penalty),
            options
                .get_f64("penalty_growth")?
                .unwrap_or(defaults.penalty_growth),
            options
                .get_f64("max_penalty")?
                .unwrap_or(defaults.max_penalty),
        )?;

        Ok(config
            .with_max_inner_iterations(max_inner_iterations)
            .with_hessian_approximation(hessian_approximation))
    }

    /// Returns the maximum number of outer iterations.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns the maximum number of inner iterations per outer iteration.
    #[must_use]
    pub fn max_inner_iterations(&self) -> usize {
        self.max_inner_iterations
    }

    /// Returns the stationarity tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns the constraint violation tolerance.
    #[must_use]
    pub fn constraint_tolerance(&self) -> f64 {
        self.constraint_tolerance
    }

    #[must_use]
    pub fn initial_penalty(&self) -> f64 {
        self.initial_penalty
    }

    #[must_use]
    pub fn penalty_growth(&self) -> f64 {
        self.penalty_growth
    }

    #[must_use]
    pub fn max_penalty(&self) -> f64 {
        self.max_penalty
    }

    #[must_use]
    pub fn hessian_approximation(&self) -> HessianApproximation {
        self.hessian_approximation
    }
}
