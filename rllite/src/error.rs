//! Crate-wide error type.

use std::fmt;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::framework::Framework;

/// Error returned by registration, construction and training.
#[derive(Debug)]
pub enum RlError {
    /// No algorithm registered under this name.
    UnknownAlgorithm(String),
    /// No environment registered under this name.
    UnknownEnvironment(String),
    /// Framework name did not parse.
    UnknownFramework(String),
    /// The framework was selected but its import is suppressed.
    BackendSuppressed(Framework),
    /// The framework was not compiled into this build.
    BackendUnavailable(Framework),
    /// A backend that must stay unloaded was found in the import table.
    BackendLeak {
        framework: Framework,
        stage: String,
    },
    /// Invalid configuration.
    Config(ConfigError),
    /// Checkpoint save/restore failure.
    Checkpoint(CheckpointError),
    /// Tensor data could not be read back from the backend.
    Tensor(String),
    /// Serialized weights could not be recorded or loaded.
    Weights(String),
    /// A rollout worker thread died or returned an error.
    Worker { worker_id: usize, message: String },
    /// Observation had the wrong length.
    ObservationSize { expected: usize, actual: usize },
    /// The algorithm was already stopped.
    Stopped,
}

impl fmt::Display for RlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlError::UnknownAlgorithm(name) => write!(f, "unknown algorithm `{}`", name),
            RlError::UnknownEnvironment(name) => write!(f, "unknown environment `{}`", name),
            RlError::UnknownFramework(name) => write!(f, "unknown framework `{}`", name),
            RlError::BackendSuppressed(fw) => {
                write!(f, "framework `{}` selected but its import is suppressed", fw)
            }
            RlError::BackendUnavailable(fw) => {
                write!(f, "framework `{}` is not compiled into this build", fw)
            }
            RlError::BackendLeak { framework, stage } => {
                write!(f, "`{}` imported {}, when it shouldn't be", framework.module_name(), stage)
            }
            RlError::Config(e) => write!(f, "invalid config: {}", e),
            RlError::Checkpoint(e) => write!(f, "checkpoint error: {}", e),
            RlError::Tensor(msg) => write!(f, "tensor read failed: {}", msg),
            RlError::Weights(msg) => write!(f, "weight transfer failed: {}", msg),
            RlError::Worker { worker_id, message } => {
                write!(f, "rollout worker {} failed: {}", worker_id, message)
            }
            RlError::ObservationSize { expected, actual } => {
                write!(f, "observation has {} values, expected {}", actual, expected)
            }
            RlError::Stopped => write!(f, "algorithm already stopped"),
        }
    }
}

impl std::error::Error for RlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RlError::Config(e) => Some(e),
            RlError::Checkpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RlError {
    fn from(e: ConfigError) -> Self {
        RlError::Config(e)
    }
}

impl From<CheckpointError> for RlError {
    fn from(e: CheckpointError) -> Self {
        RlError::Checkpoint(e)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RlError>;
