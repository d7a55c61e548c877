//! Parameter validation.
//!
//! This module provides the [`Validatable`] trait for checking a parameter
//! set before any device is touched. Validation catches errors early, so a
//! bad value never leaves a device half configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use hwconf::params::HwConfigParams;
//! use hwconf::validation::Validatable;
//!
//! let params = HwConfigParams::default();
//!
//! if !params.is_valid() {
//!     let result = params.validate();
//!     for err in &result.errors {
//!         eprintln!("Error in {}: {}", err.field, err.message);
//!     }
//! }
//! ```

use crate::error::{Error, ValidationErrorInfo};

/// Smallest MTU the kernel accepts for IPv4 capable devices.
pub const MIN_MTU: u32 = 68;

/// Largest MTU any Linux driver accepts.
pub const MAX_MTU: u32 = 65535;

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Will definitely fail when applied.
    Error,
    /// May cause issues or unexpected behavior.
    Warning,
}

/// A single validation error or warning.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Parameter that failed validation.
    pub field: String,
    /// Description of the error.
    pub message: String,
    /// Severity of the issue.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new validation warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }

    /// Check if this is an error (not a warning).
    pub fn is_error(&self) -> bool {
        self.severity == ValidationSeverity::Error
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            ValidationSeverity::Error => "error",
            ValidationSeverity::Warning => "warning",
        };
        write!(f, "{} in '{}': {}", prefix, self.field, self.message)
    }
}

/// Result of validating a parameter set.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Validation errors that will cause failure.
    pub errors: Vec<ValidationError>,
    /// Validation warnings that may cause issues.
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create an empty validation result (valid).
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the parameters are valid (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::error(field, message));
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationError::warning(field, message));
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert to a Result, failing if there are any errors.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            let errors: Vec<ValidationErrorInfo> = self
                .errors
                .into_iter()
                .map(|e| ValidationErrorInfo::new(e.field, e.message))
                .collect();
            Err(Error::Validation(errors))
        }
    }

    /// Get all issues (errors first, then warnings).
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Trait for parameter sets that can be validated before use.
pub trait Validatable {
    /// Validate these parameters.
    fn validate(&self) -> ValidationResult;

    /// Check if these parameters are valid (no errors).
    fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }
}

/// Validate an interface name.
pub fn validate_ifname(name: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if name.is_empty() {
        result.add_error(field, "interface name cannot be empty");
        return result;
    }

    // IFNAMSIZ is 16, but includes null terminator
    if name.len() > 15 {
        result.add_error(
            field,
            format!("interface name too long ({} > 15 chars)", name.len()),
        );
    }

    if name.contains('/') || name.contains('\0') || name.contains(' ') {
        result.add_error(field, "interface name contains invalid characters");
    }

    result
}

/// Validate an MTU value.
pub fn validate_mtu(mtu: u32, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
        result.add_error(
            field,
            format!("MTU must be {}-{}, got {}", MIN_MTU, MAX_MTU, mtu),
        );
    } else if mtu > 9000 {
        result.add_warning(field, format!("MTU {} exceeds most jumbo frame limits", mtu));
    }

    result
}

/// Validate a key in `ethtool` vocabulary (`rx-usecs`, `hw-tc-offload`).
pub fn validate_tool_key(key: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if key.is_empty() {
        result.add_error(field, "key cannot be empty");
    } else if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        result.add_error(field, format!("invalid key '{}'", key));
    }

    result
}

/// Validate that a per-device parameter list lines up with its device list.
pub fn validate_positional(entries: usize, devices: usize, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if entries != devices {
        result.add_error(
            field,
            format!("{} entries given for {} target devices", entries, devices),
        );
    }

    result
}
