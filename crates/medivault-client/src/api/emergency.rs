//! Break-glass emergency access endpoints

use medivault_core::session::Action;
use medivault_core::{EmergencyAccess, EmergencyGrant, ReviewDecision};

use crate::client::MediVaultClient;
use crate::error::ApiError;

impl MediVaultClient {
    /// Doctor self-grants one hour of critical-record access
    pub async fn grant_emergency(&self, grant: &EmergencyGrant) -> Result<EmergencyAccess, ApiError> {
        self.require_action(Action::GrantEmergencyAccess).await?;
        let body = grant.to_body()?;
        let granted: EmergencyAccess = self.post("/access/emergency/", &body).await?;
        log::warn!(
            "Emergency access {} granted for patient {} until {}",
            granted.id,
            body.patient_id,
            granted.expires_at
        );
        Ok(granted)
    }

    pub async fn my_emergencies(&self) -> Result<Vec<EmergencyAccess>, ApiError> {
        self.get_list("/access/emergency/my/", Vec::new()).await
    }

    /// Every grant, for admin review
    pub async fn all_emergencies(&self) -> Result<Vec<EmergencyAccess>, ApiError> {
        self.get_list("/access/emergency/all/", Vec::new()).await
    }

    /// Admin clears or flags a grant. Each grant is reviewed once.
    pub async fn review_emergency(
        &self,
        grant: &EmergencyAccess,
        decision: &ReviewDecision,
    ) -> Result<EmergencyAccess, ApiError> {
        self.require_action(Action::ReviewEmergencyAccess).await?;
        grant.clone().apply_review(decision)?;

        let _guard = self.inflight().acquire(grant.id)?;
        let path = format!("/access/emergency/{}/review/", grant.id);
        let reviewed: EmergencyAccess = self.post(&path, decision).await?;
        log::info!(
            "Emergency access {} reviewed: {}",
            reviewed.id,
            reviewed.review_status().label()
        );
        Ok(reviewed)
    }
}
