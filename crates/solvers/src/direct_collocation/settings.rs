use std::{fmt, str::FromStr};

use colloc_core::{Bounds, Mesh};

use crate::nlp::{FiniteDifference, OptimSolver, Options};

use super::{ConfigError, Scheme};

/// How the constraint Jacobian and objective gradient structure is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum SparsityDetection {
    /// Block structure derived from the variable layout.
    #[default]
    None,

    /// Perturbation at the initial guess.
    InitialGuess,

    /// Union of perturbation patterns at several random iterates.
    Random,
}

impl SparsityDetection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::InitialGuess => "initial-guess",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for SparsityDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SparsityDetection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "initial-guess" => Ok(Self::InitialGuess),
            "random" => Ok(Self::Random),
            other => Err(other.to_owned()),
        }
    }
}

/// How per-point problem evaluations are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "mode", rename_all = "lowercase")
)]
pub enum Parallelism {
    /// Evaluate grid points one after another on the solving thread.
    #[default]
    Serial,

    /// Evaluate grid points on a dedicated thread pool.
    #[cfg_attr(feature = "serde-derive", serde(alias = "openmp"))]
    Thread { num_threads: usize },
}

impl Parallelism {
    /// Parses a mode name and thread count.
    ///
    /// `"openmp"` is accepted as an alias of `"thread"`. The thread count is
    /// ignored in serial mode.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown mode or a zero thread count.
    pub fn new(mode: &str, num_threads: usize) -> Result<Self, ConfigError> {
        let parallelism = match mode {
            "serial" => Self::Serial,
            "thread" | "openmp" => Self::Thread { num_threads },
            other => {
                return Err(ConfigError::UnknownValue {
                    setting: "parallelism",
                    value: other.to_owned(),
                });
            }
        };
        parallelism.validate()?;
        Ok(parallelism)
    }

    /// Returns the mode name.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Thread { .. } => "thread",
        }
    }

    /// Returns the number of worker threads, which is 1 in serial mode.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Thread { num_threads } => *num_threads,
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Thread { num_threads: 0 } => Err(ConfigError::ZeroThreads),
            _ => Ok(()),
        }
    }
}

/// The serializable configuration of a direct collocation [`Solver`].
///
/// Every field has a default except `mesh`, which must be provided before
/// a transcription can be created. Fields are validated when a solver is
/// built from them and again when a solve starts.
///
/// [`Solver`]: super::Solver
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct Settings {
    pub mesh: Option<Mesh>,

    /// Scheme name, validated when a transcription is created.
    pub transcription_scheme: String,

    pub minimize_lagrange_multipliers: bool,
    pub lagrange_multiplier_weight: f64,

    /// Constrain Hermite–Simpson midpoint controls to the mean of the
    /// interval's endpoint controls.
    pub interpolate_control_midpoints: bool,

    pub implicit_mode_acceleration_bounds: Bounds,
    pub implicit_component_derivative_bounds: Bounds,

    pub finite_difference_scheme: FiniteDifference,
    pub sparsity_detection: SparsityDetection,
    pub sparsity_detection_random_count: usize,

    /// Prefix of the sparsity files to write; empty disables writing.
    pub write_sparsity: String,

    /// Backend iterations between observer calls; 0 disables the observer.
    pub callback_interval: usize,

    pub parallelism: Parallelism,
    pub plugin_options: Options,
    pub solver_options: Options,
    pub optim_solver: OptimSolver,

    /// Seed for random iterates and random sparsity detection.
    pub random_seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        let derivative_bounds = Bounds::new(-1000.0, 1000.0).unwrap();
        Self {
            mesh: None,
            transcription_scheme: Scheme::default().as_str().to_owned(),
            minimize_lagrange_multipliers: false,
            lagrange_multiplier_weight: 1.0,
            interpolate_control_midpoints: true,
            implicit_mode_acceleration_bounds: derivative_bounds,
            implicit_component_derivative_bounds: derivative_bounds,
            finite_difference_scheme: FiniteDifference::default(),
            sparsity_detection: SparsityDetection::default(),
            sparsity_detection_random_count: 3,
            write_sparsity: String::new(),
            callback_interval: 0,
            parallelism: Parallelism::default(),
            plugin_options: Options::new(),
            solver_options: Options::new(),
            optim_solver: OptimSolver::default(),
            random_seed: 0,
        }
    }
}

impl Settings {
    /// Checks the invariants that individual setters enforce.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sparsity_detection_random_count == 0 {
            return Err(ConfigError::ZeroRandomCount);
        }
        self.parallelism.validate()
    }

    /// Checks the settings that are only required at solve time.
    pub(super) fn validate_for_solve(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.minimize_lagrange_multipliers
            && !(self.lagrange_multiplier_weight.is_finite()
                && self.lagrange_multiplier_weight > 0.0)
        {
            return Err(ConfigError::NonPositiveMultiplierWeight {
                weight: self.lagrange_multiplier_weight,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallelism_modes() {
        assert_eq!(Parallelism::new("serial", 0), Ok(Parallelism::Serial));
        assert_eq!(
            Parallelism::new("openmp", 4),
            Ok(Parallelism::Thread { num_threads: 4 })
        );
        assert_eq!(
            Parallelism::new("thread", 0),
            Err(ConfigError::ZeroThreads)
        );
        assert!(matches!(
            Parallelism::new("mpi", 2),
            Err(ConfigError::UnknownValue {
                setting: "parallelism",
                ..
            })
        ));
        assert_eq!(Parallelism::Thread { num_threads: 3 }.num_threads(), 3);
        assert_eq!(Parallelism::Serial.mode(), "serial");
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(settings.mesh.is_none());
        assert_eq!(settings.transcription_scheme, "hermite-simpson");
        assert_eq!(settings.sparsity_detection_random_count, 3);
        assert_eq!(
            settings.implicit_mode_acceleration_bounds,
            Bounds::new(-1000.0, 1000.0).unwrap()
        );
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn multiplier_weight_is_checked_only_when_enabled() {
        let mut settings = Settings {
            lagrange_multiplier_weight: 0.0,
            ..Settings::default()
        };
        assert_eq!(settings.validate_for_solve(), Ok(()));

        settings.minimize_lagrange_multipliers = true;
        assert_eq!(
            settings.validate_for_solve(),
            Err(ConfigError::NonPositiveMultiplierWeight { weight: 0.0 })
        );
    }
}
