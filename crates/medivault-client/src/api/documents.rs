//! Document endpoints. What a caller may see is decided server-side from
//! ownership, active approved access or active emergency access.

use medivault_core::records::{Document, DocumentQuery, DocumentUpload, EmergencySummary, TimelineEntry};
use medivault_core::session::Action;
use uuid::Uuid;

use crate::client::MediVaultClient;
use crate::error::ApiError;
use crate::transport::{ApiRequest, Body, Method, MultipartForm};

impl MediVaultClient {
    pub async fn documents(&self, query: &DocumentQuery) -> Result<Vec<Document>, ApiError> {
        self.get_list("/documents/", query.to_params()).await
    }

    pub async fn document(&self, id: Uuid) -> Result<Document, ApiError> {
        self.get(&format!("/documents/{}/", id)).await
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<(), ApiError> {
        self.require_action(Action::ManageOwnDocuments).await?;
        let _guard = self.inflight().acquire(id)?;
        self.delete(&format!("/documents/{}/", id)).await?;
        log::info!("Deleted document {}", id);
        Ok(())
    }

    pub async fn upload_document(&self, upload: &DocumentUpload) -> Result<Document, ApiError> {
        self.require_action(Action::ManageOwnDocuments).await?;
        upload.validate()?;
        let form = MultipartForm {
            fields: upload
                .form_fields()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            file_field: "file".to_string(),
            file_name: upload.file_name.clone(),
            bytes: upload.file_bytes.clone(),
        };
        let request = ApiRequest::new(Method::Post, "/documents/upload/").with_body(Body::Multipart(form));
        let document: Document = self.send(request).await?.json()?;
        log::info!("Uploaded document {} ({} bytes)", document.id, upload.file_bytes.len());
        Ok(document)
    }

    /// The signed-in patient's documents in date order
    pub async fn timeline(&self) -> Result<Vec<TimelineEntry>, ApiError> {
        self.get_list("/documents/timeline/", Vec::new()).await
    }

    /// Own summary when `patient_id` is None, otherwise that patient's
    pub async fn emergency_summary(&self, patient_id: Option<&str>) -> Result<EmergencySummary, ApiError> {
        self.require_action(Action::ViewEmergencySummary).await?;
        let path = match patient_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => format!("/documents/emergency-summary/{}/", id),
            None => "/documents/emergency-summary/".to_string(),
        };
        self.get(&path).await
    }
}
