//! Field validation for lifecycle forms
//!
//! Validation runs before anything is sent to the server. Errors accumulate
//! so a form can report every bad field at once and keep the entered values.

use serde::{Deserialize, Serialize};

/// Validation error with detailed context
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: ValidationErrorCode,
}

/// Specific validation error codes for programmatic handling
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    InvalidFormat,
    OutOfRange,
    TooLong,
    Empty,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({:?})", self.field, self.message, self.code)
    }
}

/// Validation result that can accumulate multiple errors
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            code,
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// First message reported for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// Non-empty list of validation failures
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn single(field: &str, message: &str, code: ValidationErrorCode) -> Self {
        let mut result = ValidationResult::new();
        result.add_error(field, message, code);
        ValidationErrors(result.errors)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Require a value that is non-empty after trimming whitespace
pub fn require_text(value: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if value.trim().is_empty() {
        result.add_error(field, &format!("{} is required", field), ValidationErrorCode::Required);
    }
    result
}

/// Require an integer within an inclusive range
pub fn require_range(value: u32, min: u32, max: u32, field: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if value < min || value > max {
        result.add_error(
            field,
            &format!("{} must be between {} and {}", field, min, max),
            ValidationErrorCode::OutOfRange,
        );
    }
    result
}

/// Validate a patient identifier as typed into a form
///
/// Only presence and length are checked here. Whether the identifier
/// resolves to a patient is for the server to say.
pub fn validate_patient_code(code: &str) -> ValidationResult {
    let mut result = require_text(code, "patient_id");
    if result.is_valid() && code.trim().len() > 20 {
        result.add_error(
            "patient_id",
            "patient_id cannot exceed 20 characters",
            ValidationErrorCode::TooLong,
        );
    }
    result
}
