//! Notification and audit log endpoints

use medivault_core::audit::{MarkReadBody, UnreadCount};
use medivault_core::{AuditLogEntry, Notification, NotificationFeed};
use serde_json::Value;
use uuid::Uuid;

use crate::client::MediVaultClient;
use crate::error::ApiError;

impl MediVaultClient {
    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get_list("/notifications/", Vec::new()).await
    }

    pub async fn unread_count(&self) -> Result<UnreadCount, ApiError> {
        self.get("/notifications/unread/").await
    }

    /// Mark `ids` read; an empty slice marks everything read
    pub async fn mark_read(&self, ids: &[Uuid]) -> Result<(), ApiError> {
        let body = MarkReadBody { ids: ids.to_vec() };
        let _: Value = self.post("/notifications/mark-read/", &body).await?;
        Ok(())
    }

    /// Recent notifications and the unread count in one snapshot
    pub async fn notification_feed(&self) -> Result<NotificationFeed, ApiError> {
        let unread = self.unread_count().await?;
        let items = self.notifications().await?;
        Ok(NotificationFeed::new(items, unread, self.now()))
    }

    /// Opening the bell: every listed unread item is marked read in one
    /// call, then the local feed shows zero unread. Returns how many changed.
    pub async fn open_notifications(&self, feed: &mut NotificationFeed) -> Result<usize, ApiError> {
        let unread = feed.unread_ids();
        if !unread.is_empty() {
            self.mark_read(&unread).await?;
        }
        Ok(feed.mark_all_read())
    }

    /// Audit entries visible to the caller: own for patients and doctors,
    /// all for admins
    pub async fn audit_log(&self) -> Result<Vec<AuditLogEntry>, ApiError> {
        self.get_list("/audit/", Vec::new()).await
    }
}
