//! Documents, emergency summaries and admin statistics
//!
//! Plain data carried over the API. Which documents a caller may see is
//! decided by the server from the caller's active access.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::ScopeTag;
use crate::validation::{require_text, ValidationErrors};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Prescription,
    Report,
    Scan,
    Discharge,
    Vaccination,
    Other,
}

impl DocumentType {
    /// Whether access granted with `scope` covers this document type
    pub fn covered_by(&self, scope: &[ScopeTag]) -> bool {
        if scope.contains(&ScopeTag::All) {
            return true;
        }
        let tag = match self {
            DocumentType::Prescription => ScopeTag::Prescription,
            DocumentType::Report => ScopeTag::Report,
            DocumentType::Scan => ScopeTag::Scan,
            DocumentType::Discharge => ScopeTag::Discharge,
            DocumentType::Vaccination => ScopeTag::Vaccination,
            DocumentType::Other => return false,
        };
        scope.contains(&tag)
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            DocumentType::Prescription => "PRESCRIPTION",
            DocumentType::Report => "REPORT",
            DocumentType::Scan => "SCAN",
            DocumentType::Discharge => "DISCHARGE",
            DocumentType::Vaccination => "VACCINATION",
            DocumentType::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRESCRIPTION" => Ok(DocumentType::Prescription),
            "REPORT" => Ok(DocumentType::Report),
            "SCAN" => Ok(DocumentType::Scan),
            "DISCHARGE" => Ok(DocumentType::Discharge),
            "VACCINATION" => Ok(DocumentType::Vaccination),
            "OTHER" => Ok(DocumentType::Other),
            other => Err(format!("unknown document type '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    HospitalVisit,
    Diagnosis,
    Procedure,
    Checkup,
    Emergency,
    #[default]
    #[serde(other)]
    Other,
}

impl EventType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventType::HospitalVisit => "HOSPITAL_VISIT",
            EventType::Diagnosis => "DIAGNOSIS",
            EventType::Procedure => "PROCEDURE",
            EventType::Checkup => "CHECKUP",
            EventType::Emergency => "EMERGENCY",
            EventType::Other => "OTHER",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub patient: Uuid,
    #[serde(default)]
    pub uploaded_by: Option<Uuid>,
    #[serde(default)]
    pub uploaded_by_name: Option<String>,
    pub document_type: DocumentType,
    #[serde(default)]
    pub event_type: EventType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hospital_name: String,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub tags_list: Vec<String>,
    pub document_date: NaiveDate,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    /// Visible under break-glass access
    #[serde(default)]
    pub is_critical: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Entry of `GET /documents/timeline/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub id: Uuid,
    pub document_type: DocumentType,
    #[serde(default)]
    pub event_type: EventType,
    pub title: String,
    #[serde(default)]
    pub hospital_name: String,
    #[serde(default)]
    pub doctor_name: String,
    pub document_date: NaiveDate,
    /// e.g. "March 2026"
    #[serde(default)]
    pub month_year: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// Timeline entries grouped by month, newest group first as served
pub fn group_timeline(entries: &[TimelineEntry]) -> Vec<(String, Vec<&TimelineEntry>)> {
    let mut groups: Vec<(String, Vec<&TimelineEntry>)> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some((label, items)) if *label == entry.month_year => items.push(entry),
            _ => groups.push((entry.month_year.clone(), vec![entry])),
        }
    }
    groups
}

/// Query filters for `GET /documents/`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Required when a doctor or admin lists another patient's documents
    pub patient_id: Option<String>,
    pub document_type: Option<DocumentType>,
    pub is_critical: Option<bool>,
    pub search: Option<String>,
}

impl DocumentQuery {
    pub fn for_patient(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            ..Self::default()
        }
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(patient_id) = &self.patient_id {
            params.push(("patient_id".to_string(), patient_id.clone()));
        }
        if let Some(document_type) = self.document_type {
            params.push(("document_type".to_string(), document_type.wire_name().to_string()));
        }
        if let Some(critical) = self.is_critical {
            params.push(("is_critical".to_string(), critical.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("search".to_string(), search.trim().to_string()));
        }
        params
    }
}

/// Metadata fields of a multipart upload; the file travels alongside
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub event_type: EventType,
    pub title: String,
    pub description: String,
    pub hospital_name: String,
    pub doctor_name: String,
    /// Comma-separated
    pub tags: String,
    pub document_date: NaiveDate,
    pub is_critical: bool,
    pub file_name: String,
    pub file_bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut result = require_text(&self.title, "title");
        result.merge(require_text(&self.file_name, "file"));
        if self.file_bytes.is_empty() {
            result.add_error("file", "file is empty", crate::validation::ValidationErrorCode::Empty);
        }
        result.into_result()
    }

    /// Text fields of the multipart form, in wire names
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("document_type", self.document_type.wire_name().to_string()),
            ("event_type", self.event_type.wire_name().to_string()),
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("hospital_name", self.hospital_name.clone()),
            ("doctor_name", self.doctor_name.clone()),
            ("tags", self.tags.clone()),
            ("document_date", self.document_date.format("%Y-%m-%d").to_string()),
            ("is_critical", self.is_critical.to_string()),
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EmergencyContact {
    pub name: String,
    pub relation: String,
    pub phone: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CriticalDocument {
    pub id: Uuid,
    pub title: String,
    pub document_type: DocumentType,
    pub document_date: NaiveDate,
}

/// Quick card for emergencies: `GET /documents/emergency-summary/[{id}/]`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmergencySummary {
    #[serde(default)]
    pub patient_id: Option<String>,
    pub full_name: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub chronic_conditions: String,
    #[serde(default)]
    pub special_notes: String,
    #[serde(default)]
    pub current_medications: String,
    #[serde(default)]
    pub emergency_contact: EmergencyContact,
    #[serde(default)]
    pub critical_documents: Vec<CriticalDocument>,
}

impl EmergencySummary {
    /// Allergies split from the stored comma-separated text
    pub fn allergy_list(&self) -> Vec<&str> {
        split_list(&self.allergies)
    }

    pub fn condition_list(&self) -> Vec<&str> {
        split_list(&self.chronic_conditions)
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// `GET /auth/admin/stats/`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AdminStats {
    pub total_patients: u64,
    pub total_doctors: u64,
    pub total_documents: u64,
    pub emergency_accesses_today: u64,
    pub pending_access_requests: u64,
    pub pending_doctor_approvals: u64,
}

/// Admin account operations for `POST /auth/admin/users/{id}/toggle/`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserToggle {
    Block,
    Unblock,
    Approve,
}

impl std::str::FromStr for UserToggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(UserToggle::Block),
            "unblock" => Ok(UserToggle::Unblock),
            "approve" => Ok(UserToggle::Approve),
            other => Err(format!("unknown user action '{}'", other)),
        }
    }
}
