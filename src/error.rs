//! Error types for the simulator.

use std::path::PathBuf;

use rover_navigation::NavigationError;
use thiserror::Error;

/// Errors raised while configuring, loading, or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The scenario identifier resolved to no data.
    #[error("scenario not found: {}", path.display())]
    ScenarioNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A scenario table has the wrong shape or unparsable content.
    #[error("malformed scenario file {}: {reason}", path.display())]
    MalformedScenario {
        /// Offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A covariance matrix is not symmetric positive semi-definite.
    #[error("invalid covariance: {0}")]
    InvalidCovariance(String),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An operation was called in a simulator state that does not allow it.
    #[error("invalid simulator state: {0}")]
    InvalidState(&'static str),

    /// A configuration source could not be read or deserialized.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl From<NavigationError> for SimError {
    fn from(e: NavigationError) -> Self {
        SimError::InvalidConfiguration(e.to_string())
    }
}

/// Result alias used throughout the simulator.
pub type Result<T> = std::result::Result<T, SimError>;
