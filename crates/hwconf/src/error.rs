//! Error types for hardware configuration.

use std::io;

/// Result type for hardware configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrorInfo {
    /// Parameter that failed validation.
    pub field: String,
    /// Description of the failure.
    pub message: String,
}

impl ValidationErrorInfo {
    /// Create a new validation error info.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur while configuring or deconfiguring devices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from spawning or talking to a process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error.
    #[cfg(feature = "yaml")]
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A user supplied value is out of its accepted range or set.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// The parameter name.
        name: String,
        /// What is wrong and what would be accepted.
        message: String,
    },

    /// The parameter set failed validation.
    #[error("validation failed: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationErrorInfo>),

    /// A command run on a host exited non-zero.
    #[error("{host}: `{command}` failed with exit code {exit_code}: {stderr}")]
    RemoteCommand {
        /// Host (or namespace) identifier.
        host: String,
        /// The command line that was run.
        command: String,
        /// Exit code, or -1 when killed by a signal.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// Tool output could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The device does not know how to read or write an attribute.
    #[error("{device}: unsupported attribute {attribute}")]
    UnsupportedAttribute {
        /// Device identifier.
        device: String,
        /// Attribute name.
        attribute: String,
    },

    /// A concern was configured twice within one run.
    #[error("{concern} is already configured")]
    AlreadyConfigured {
        /// The concern key.
        concern: String,
    },
}

fn format_validation_errors(errors: &[ValidationErrorInfo]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if this error was caused by user input rather than the system.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::Validation(_))
    }

    /// Check if this is a failed remote command.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Self::RemoteCommand { .. })
    }

    /// Get the exit code if this is a failed remote command.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::RemoteCommand { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
