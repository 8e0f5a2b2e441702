//! Admin account management and statistics

use medivault_core::records::{AdminStats, UserToggle};
use medivault_core::session::Action;
use medivault_core::{Role, User};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::client::MediVaultClient;
use crate::error::ApiError;

#[derive(Deserialize)]
struct ToggleResponse {
    user: User,
}

impl MediVaultClient {
    pub async fn admin_users(&self, role: Option<Role>) -> Result<Vec<User>, ApiError> {
        self.require_action(Action::ManageUsers).await?;
        let query = role
            .map(|r| vec![("role".to_string(), r.to_string())])
            .unwrap_or_default();
        self.get_list("/auth/admin/users/", query).await
    }

    /// Block, unblock or approve an account
    pub async fn toggle_user(&self, id: Uuid, toggle: UserToggle) -> Result<User, ApiError> {
        self.require_action(Action::ManageUsers).await?;
        let _guard = self.inflight().acquire(id)?;
        let path = format!("/auth/admin/users/{}/toggle/", id);
        let response: ToggleResponse = self.post(&path, &json!({ "action": toggle })).await?;
        log::info!(
            "User {} now active={} approved={}",
            response.user.email,
            response.user.is_active,
            response.user.is_approved
        );
        Ok(response.user)
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.require_action(Action::ManageUsers).await?;
        self.get("/auth/admin/stats/").await
    }
}
