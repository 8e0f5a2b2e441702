//! Access request endpoints

use medivault_core::access::RespondBody;
use medivault_core::session::Action;
use medivault_core::{AccessRequest, AccessStatus, NewAccessRequest, Response};

use crate::client::MediVaultClient;
use crate::error::ApiError;

impl MediVaultClient {
    /// Doctor asks a patient for scoped, time-limited access
    pub async fn create_access_request(&self, form: &NewAccessRequest) -> Result<AccessRequest, ApiError> {
        self.require_action(Action::CreateAccessRequest).await?;
        let body = form.to_body()?;
        let created: AccessRequest = self.post("/access/request/", &body).await?;
        log::info!("Access request {} sent for patient {}", created.id, body.patient_id);
        Ok(created)
    }

    /// Requests the signed-in doctor has sent
    pub async fn my_requests(&self) -> Result<Vec<AccessRequest>, ApiError> {
        self.get_list("/access/my-requests/", Vec::new()).await
    }

    /// Requests addressed to the signed-in patient
    pub async fn incoming_requests(&self, status: Option<AccessStatus>) -> Result<Vec<AccessRequest>, ApiError> {
        let query = status
            .map(|s| vec![("status".to_string(), s.to_string())])
            .unwrap_or_default();
        self.get_list("/access/incoming/", query).await
    }

    /// Patient approves, rejects or revokes.
    ///
    /// The transition is checked against `request` first; an invalid one
    /// never reaches the server. Only one response per request may be in
    /// flight.
    pub async fn respond(
        &self,
        request: &AccessRequest,
        response: &Response,
        patient_note: Option<String>,
    ) -> Result<AccessRequest, ApiError> {
        self.require_action(Action::RespondToAccessRequest).await?;
        request.check_response(response, self.now())?;

        let _guard = self.inflight().acquire(request.id)?;
        let body = RespondBody::new(response, patient_note);
        let path = format!("/access/{}/respond/", request.id);
        let updated: AccessRequest = self.post(&path, &body).await?;
        log::info!("Access request {} is now {}", updated.id, updated.status);
        Ok(updated)
    }
}
