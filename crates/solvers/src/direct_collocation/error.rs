use std::{error::Error as StdError, fmt, io};

use colloc_core::MeshError;
use thiserror::Error;

use crate::nlp::{EvalError, OptionsError, auglag};

/// Errors caused by invalid or incomplete solver settings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid mesh: {0}")]
    Mesh(#[from] MeshError),

    #[error("unknown {setting} '{value}'")]
    UnknownValue {
        setting: &'static str,
        value: String,
    },

    #[error("no mesh has been set")]
    MissingMesh,

    #[error("lagrange_multiplier_weight must be finite and positive, got {weight}")]
    NonPositiveMultiplierWeight { weight: f64 },

    #[error("sparsity_detection_random_count must be at least 1")]
    ZeroRandomCount,

    #[error("thread parallelism needs at least 1 thread")]
    ZeroThreads,

    #[error("variable '{variable}' has an infinite bound")]
    InfiniteBounds { variable: String },

    #[error("iterate field '{field}' has {actual} entries, expected {expected}")]
    IterateShape {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("iterate has no points")]
    EmptyIterate,

    #[error("invalid plugin options: {0}")]
    Options(#[from] OptionsError),

    #[error("invalid solver options: {0}")]
    Backend(#[from] auglag::ConfigError),
}

/// A problem function evaluated by the transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Dynamics,
    IntegralCost,
    EndpointCost,
    PathConstraint,
    BoundaryConstraint,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dynamics => "dynamics",
            Self::IntegralCost => "integral cost",
            Self::EndpointCost => "endpoint cost",
            Self::PathConstraint => "path constraint",
            Self::BoundaryConstraint => "boundary constraint",
        })
    }
}

/// A failure of a problem function during a solve.
///
/// `time` is the time of the evaluated point, or the final time for the
/// endpoint cost and boundary constraints.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{function} failed at t = {time}: {source}")]
    Callback {
        function: Function,
        time: f64,
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{function} returned a non-finite value at t = {time}")]
    NonFinite { function: Function, time: f64 },

    #[error("{function} returned {actual} values at t = {time}, expected {expected}")]
    Dimension {
        function: Function,
        time: f64,
        expected: usize,
        actual: usize,
    },
}

impl EvaluationError {
    /// Recovers an evaluation error that passed through a backend as an
    /// opaque [`EvalError`].
    pub(super) fn recover(error: EvalError) -> Error {
        match error.downcast::<Self>() {
            Ok(evaluation) => Error::Evaluation(*evaluation),
            Err(other) => Error::Backend(auglag::Error::Evaluation(other)),
        }
    }
}

/// Errors that can occur when transcribing or solving a problem.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unsupported transcription scheme '{name}'")]
    UnsupportedScheme { name: String },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("backend error: {0}")]
    Backend(auglag::Error),

    #[error("failed to write sparsity pattern: {0}")]
    WriteSparsity(#[source] io::Error),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<auglag::Error> for Error {
    fn from(error: auglag::Error) -> Self {
        match error {
            auglag::Error::Evaluation(inner) => EvaluationError::recover(inner),
            other => Self::Backend(other),
        }
    }
}

impl From<MeshError> for Error {
    fn from(error: MeshError) -> Self {
        Self::Config(error.into())
    }
}
