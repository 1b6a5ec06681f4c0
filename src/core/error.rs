//! Construction-time errors.

use thiserror::Error;

/// A required construction argument is missing or invalid.
///
/// Configuration errors are fatal: they are raised while a model or a
/// parameter block is being built, before any solve is attempted, and the
/// message names the offending block and argument. Solver failures are *not*
/// configuration errors; they are reported as a
/// [`TerminationStatus`](crate::core::solver::TerminationStatus).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{block}: {message}")]
pub struct ConfigurationError {
    /// Name of the block being constructed.
    pub block: String,

    /// Description of the missing or invalid argument.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a configuration error for the named block.
    pub fn new(block: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            message: message.into(),
        }
    }

    /// Creates the standard error for an unassigned parameter.
    pub fn missing_parameter(block: impl Into<String>, parameter: &str) -> Self {
        Self {
            block: block.into(),
            message: format!(
                "parameter {parameter} was not assigned a value. \
                 Please check your configuration arguments."
            ),
        }
    }
}
