use crate::validation::ValidationErrors;

/// Errors raised by the lifecycle model before anything reaches the server
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Invalid state for {entity}: {reason}")]
    InvalidState { entity: &'static str, reason: String },

    #[error("Not permitted: {0}")]
    NotPermitted(String),
}

impl LifecycleError {
    pub(crate) fn invalid_state(entity: &'static str, reason: impl Into<String>) -> Self {
        LifecycleError::InvalidState {
            entity,
            reason: reason.into(),
        }
    }
}

impl From<ValidationErrors> for LifecycleError {
    fn from(errors: ValidationErrors) -> Self {
        LifecycleError::Validation(errors)
    }
}
