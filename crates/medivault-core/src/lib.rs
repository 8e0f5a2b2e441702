//! MediVault Access Lifecycle Model
//!
//! The rules a client follows to request, grant, review and revoke access to
//! a patient's records:
//! - Access requests: doctor asks, patient approves/rejects/revokes
//! - Break-glass emergency access: one-hour self-grant, reviewed by an admin
//! - Role gating of lifecycle actions
//! - Read-only audit and notification projections
//!
//! Nothing here performs I/O or reads a clock. Every time-dependent answer
//! takes `now` as a parameter, so the server stays the only source of truth
//! and the model stays testable.
//!
//! # Example
//!
//! ```rust
//! use medivault_core::access::{ScopeSelection, ScopeTag, NewAccessRequest};
//!
//! let mut scope = ScopeSelection::default();
//! scope.toggle(ScopeTag::Report);
//!
//! let form = NewAccessRequest::new("MV48213377", scope, "follow-up", 48);
//! let body = form.to_body().unwrap();
//! assert_eq!(body.scope, vec![ScopeTag::Prescription, ScopeTag::Report]);
//! ```

pub mod access;
pub mod audit;
pub mod emergency;
pub mod error;
pub mod records;
pub mod session;
pub mod validation;

// Re-export commonly used types for convenience
pub use access::{
    AccessRequest, AccessStatus, ApprovalDuration, NewAccessRequest, RequestFilter, Response,
    ResponseKind, ScopeSelection, ScopeTag,
};
pub use audit::{AuditAction, AuditLogEntry, Notification, NotificationFeed, NotificationType};
pub use emergency::{EmergencyAccess, EmergencyGrant, EmergencyReason, ReviewBuckets, ReviewDecision, ReviewStatus};
pub use error::LifecycleError;
pub use session::{Action, Role, User};
pub use validation::{ValidationError, ValidationErrors, ValidationResult};
