//! Audit trail and notification projections
//!
//! Both are read-only views of what the server recorded. The client never
//! creates or edits audit entries; notifications can only be marked read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DocumentView,
    DocumentDownload,
    DocumentUpload,
    DocumentDelete,
    AccessRequest,
    AccessApprove,
    AccessReject,
    AccessRevoke,
    EmergencyAccess,
    ProfileUpdate,
    Login,
    Logout,
}

impl AuditAction {
    pub fn label(&self) -> &'static str {
        match self {
            AuditAction::DocumentView => "Viewed Document",
            AuditAction::DocumentDownload => "Downloaded Document",
            AuditAction::DocumentUpload => "Uploaded Document",
            AuditAction::DocumentDelete => "Deleted Document",
            AuditAction::AccessRequest => "Sent Access Request",
            AuditAction::AccessApprove => "Approved Access",
            AuditAction::AccessReject => "Rejected Access",
            AuditAction::AccessRevoke => "Revoked Access",
            AuditAction::EmergencyAccess => "Emergency Break-Glass Access",
            AuditAction::ProfileUpdate => "Updated Profile",
            AuditAction::Login => "User Login",
            AuditAction::Logout => "User Logout",
        }
    }

    pub fn wire_name(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Append-only audit record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    #[serde(default)]
    pub actor: Option<Uuid>,
    /// "System" when the actor account no longer exists
    #[serde(default)]
    pub actor_name: String,
    #[serde(default)]
    pub target_patient: Option<Uuid>,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub action: AuditAction,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub document_title: String,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub extra_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Case-insensitive match on actor name, action or document title
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.actor_name.to_lowercase().contains(&query)
            || self.action.wire_name().to_lowercase().contains(&query)
            || self.action.label().to_lowercase().contains(&query)
            || self.document_title.to_lowercase().contains(&query)
    }
}

/// Entries matching a free-text filter
pub fn filter_entries<'a>(entries: &'a [AuditLogEntry], query: &str) -> Vec<&'a AuditLogEntry> {
    entries.iter().filter(|e| e.matches(query)).collect()
}

/// Entries produced by break-glass access
pub fn emergency_entries(entries: &[AuditLogEntry]) -> Vec<&AuditLogEntry> {
    entries.iter().filter(|e| e.is_emergency).collect()
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    AccessRequest,
    AccessApproved,
    AccessRejected,
    AccessRevoked,
    EmergencyAccess,
    AccessExpired,
    DocumentShared,
    #[serde(other)]
    System,
}

impl NotificationType {
    pub fn is_alert(&self) -> bool {
        matches!(self, NotificationType::EmergencyAccess | NotificationType::AccessRevoked)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    #[serde(default)]
    pub actor_name: String,
    /// Access request or emergency grant this notification is about
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Body of `GET /notifications/unread/`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UnreadCount {
    pub unread_count: u32,
}

/// Body of `POST /notifications/mark-read/`. No ids marks everything read.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MarkReadBody {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<Uuid>,
}

/// Latest notifications and unread count, as the bell shows them
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotificationFeed {
    pub items: Vec<Notification>,
    pub unread_count: u32,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl NotificationFeed {
    pub fn new(items: Vec<Notification>, unread: UnreadCount, fetched_at: DateTime<Utc>) -> Self {
        Self {
            items,
            unread_count: unread.unread_count,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(|n| !n.is_read)
    }

    pub fn unread_ids(&self) -> Vec<Uuid> {
        self.unread().map(|n| n.id).collect()
    }

    /// Mark every listed notification read and zero the count.
    ///
    /// Returns how many were unread. One way: nothing here un-reads.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.items.iter_mut().filter(|n| !n.is_read) {
            notification.is_read = true;
            changed += 1;
        }
        self.unread_count = 0;
        changed
    }
}
