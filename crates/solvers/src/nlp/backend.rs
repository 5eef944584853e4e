use std::{fmt, str::FromStr};

use colloc_core::Observer;

use super::{Derivatives, Nlp, Options, OptionsError, auglag};

/// Selects the backend that solves a transcribed problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimSolver {
    /// The built-in [`auglag`] solver.
    #[default]
    #[cfg_attr(feature = "serde-derive", serde(rename = "auglag"))]
    AugmentedLagrangian,
}

impl OptimSolver {
    /// Returns the name the backend is selected by.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AugmentedLagrangian => "auglag",
        }
    }

    /// Parses backend-specific options into a validated config.
    ///
    /// # Errors
    ///
    /// Returns an error if an option is unknown, has the wrong type, or has
    /// an invalid value.
    pub fn config(&self, options: &Options) -> Result<auglag::Config, auglag::ConfigError> {
        match self {
            Self::AugmentedLagrangian => auglag::Config::from_options(options),
        }
    }

    /// Solves `nlp` from `x0` with the selected backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot evaluate the NLP.
    pub fn solve<N, Obs>(
        &self,
        nlp: &N,
        derivatives: &Derivatives,
        x0: &[f64],
        config: &auglag::Config,
        observer: Obs,
    ) -> Result<auglag::Solution, auglag::Error>
    where
        N: Nlp,
        Obs: for<'a> Observer<auglag::Event<'a>, auglag::Action>,
    {
        match self {
            Self::AugmentedLagrangian => auglag::minimize(nlp, derivatives, x0, config, observer),
        }
    }
}

impl fmt::Display for OptimSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimSolver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auglag" => Ok(Self::AugmentedLagrangian),
            other => Err(other.to_owned()),
        }
    }
}

/// Options that control the solve wrapper rather than the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PluginOptions {
    /// Log a summary of every outer iteration at `info` level.
    pub verbose: bool,

    /// Log the wall time of the solve at `info` level.
    pub print_time: bool,
}

impl PluginOptions {
    const KEYS: [&'static str; 2] = ["verbose", "print_time"];

    /// Reads plugin options from a dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown key or a non-boolean value.
    pub fn from_options(options: &Options) -> Result<Self, OptionsError> {
        options.check_keys(&Self::KEYS)?;
        Ok(Self {
            verbose: options.get_bool("verbose")?.unwrap_or(false),
            print_time: options.get_bool("print_time")?.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("auglag".parse(), Ok(OptimSolver::AugmentedLagrangian));
        assert_eq!(OptimSolver::default().to_string(), "auglag");
        assert_eq!("ipopt".parse::<OptimSolver>(), Err("ipopt".to_owned()));
    }

    #[test]
    fn plugin_options_reject_unknown_keys() {
        let options = Options::new().with("print_time", true);
        assert_eq!(
            PluginOptions::from_options(&options),
            Ok(PluginOptions {
                verbose: false,
                print_time: true,
            })
        );

        let options = Options::new().with("expand", true);
        assert!(matches!(
            PluginOptions::from_options(&options),
            Err(OptionsError::Unknown { .. })
        ));
    }
}
