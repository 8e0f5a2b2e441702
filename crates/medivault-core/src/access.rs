//! Consent-based access requests
//!
//! A doctor asks for scoped, time-boxed access to a patient's documents and
//! the patient approves, rejects or later revokes it. Approved access lapses
//! on its own once `expires_at` passes; that is the one transition no event
//! drives, so activity is always derived from an injected `now`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifecycleError;
use crate::validation::{
    require_range, require_text, validate_patient_code, ValidationErrorCode, ValidationErrors,
    ValidationResult,
};

/// Shortest access a doctor may ask for or a patient may grant
pub const MIN_DURATION_HOURS: u32 = 1;

/// Longest access the server accepts (30 days)
pub const MAX_DURATION_HOURS: u32 = 720;

/// Approval duration used when the patient does not pick one
pub const DEFAULT_APPROVAL_HOURS: u32 = 24;

/// Document categories a request can cover
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeTag {
    /// Wildcard: every document the patient holds
    All,
    Prescription,
    Report,
    Scan,
    Discharge,
    Vaccination,
}

impl ScopeTag {
    pub const SPECIFIC: [ScopeTag; 5] = [
        ScopeTag::Prescription,
        ScopeTag::Report,
        ScopeTag::Scan,
        ScopeTag::Discharge,
        ScopeTag::Vaccination,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            ScopeTag::All => "ALL",
            ScopeTag::Prescription => "PRESCRIPTION",
            ScopeTag::Report => "REPORT",
            ScopeTag::Scan => "SCAN",
            ScopeTag::Discharge => "DISCHARGE",
            ScopeTag::Vaccination => "VACCINATION",
        }
    }

    /// Label shown next to the scope checkbox on the request form
    pub fn option_label(&self) -> &'static str {
        match self {
            ScopeTag::All => "All Documents",
            ScopeTag::Prescription => "Prescriptions",
            ScopeTag::Report => "Lab Reports",
            ScopeTag::Scan => "Scans / Imaging",
            ScopeTag::Discharge => "Discharge Summaries",
            ScopeTag::Vaccination => "Vaccination Records",
        }
    }

    /// Short label: wire name capitalised ("REPORT" -> "Report")
    pub fn short_label(&self) -> String {
        let name = self.wire_name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl std::str::FromStr for ScopeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(ScopeTag::All),
            "PRESCRIPTION" => Ok(ScopeTag::Prescription),
            "REPORT" => Ok(ScopeTag::Report),
            "SCAN" => Ok(ScopeTag::Scan),
            "DISCHARGE" => Ok(ScopeTag::Discharge),
            "VACCINATION" => Ok(ScopeTag::Vaccination),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

/// Label for a whole scope as the request lists render it
pub fn scope_label(scope: &[ScopeTag]) -> String {
    if scope.contains(&ScopeTag::All) {
        return ScopeTag::All.option_label().to_string();
    }
    scope
        .iter()
        .map(|tag| tag.short_label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Scope being edited on the request form.
///
/// ALL is exclusive: picking it clears every specific tag, and picking a
/// specific tag drops ALL. Insertion order is kept for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeSelection {
    tags: Vec<ScopeTag>,
}

impl Default for ScopeSelection {
    fn default() -> Self {
        Self {
            tags: vec![ScopeTag::Prescription],
        }
    }
}

impl ScopeSelection {
    pub fn empty() -> Self {
        Self { tags: Vec::new() }
    }

    pub fn toggle(&mut self, tag: ScopeTag) {
        if tag == ScopeTag::All {
            self.tags = vec![ScopeTag::All];
            return;
        }
        self.tags.retain(|t| *t != ScopeTag::All);
        if let Some(pos) = self.tags.iter().position(|t| *t == tag) {
            self.tags.remove(pos);
        } else {
            self.tags.push(tag);
        }
    }

    pub fn tags(&self) -> &[ScopeTag] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: ScopeTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Freeze the selection into a scope; fails when nothing is selected.
    pub fn to_scope(&self) -> Result<Vec<ScopeTag>, ValidationErrors> {
        if self.tags.is_empty() {
            return Err(ValidationErrors::single(
                "scope",
                "select at least one document category",
                ValidationErrorCode::Empty,
            ));
        }
        Ok(self.tags.clone())
    }
}

impl FromIterator<ScopeTag> for ScopeSelection {
    /// Applies each tag as a toggle, in order.
    fn from_iter<I: IntoIterator<Item = ScopeTag>>(iter: I) -> Self {
        let mut selection = ScopeSelection::empty();
        for tag in iter {
            selection.toggle(tag);
        }
        selection
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
    Expired,
}

impl AccessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AccessStatus::Rejected | AccessStatus::Revoked | AccessStatus::Expired
        )
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessStatus::Pending => write!(f, "PENDING"),
            AccessStatus::Approved => write!(f, "APPROVED"),
            AccessStatus::Rejected => write!(f, "REJECTED"),
            AccessStatus::Revoked => write!(f, "REVOKED"),
            AccessStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Access request as the server returns it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccessRequest {
    pub id: Uuid,
    pub doctor: Uuid,
    #[serde(default)]
    pub doctor_name: String,
    pub patient: Uuid,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub patient_id_code: Option<String>,
    pub status: AccessStatus,
    pub scope: Vec<ScopeTag>,
    pub reason: String,
    #[serde(default)]
    pub patient_note: String,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Server's snapshot at serialization time. Stale by the time it is
    /// read; use [`AccessRequest::is_active`] instead.
    #[serde(default, rename = "is_active")]
    pub server_is_active: bool,
}

/// Whether access with this status and expiry is live at `now`.
///
/// A missing expiry never reads as active.
pub fn is_active(status: AccessStatus, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    status == AccessStatus::Approved && expires_at.map_or(false, |expiry| now < expiry)
}

/// Patient's answer to a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    Approve { duration_hours: u32 },
    Reject,
    Revoke,
}

/// Response kinds, without their parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Approve,
    Reject,
    Revoke,
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Approve { .. } => ResponseKind::Approve,
            Response::Reject => ResponseKind::Reject,
            Response::Revoke => ResponseKind::Revoke,
        }
    }

    pub fn approve_default() -> Self {
        Response::Approve {
            duration_hours: DEFAULT_APPROVAL_HOURS,
        }
    }
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseKind::Approve => write!(f, "approve"),
            ResponseKind::Reject => write!(f, "reject"),
            ResponseKind::Revoke => write!(f, "revoke"),
        }
    }
}

impl std::str::FromStr for ResponseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approve" => Ok(ResponseKind::Approve),
            "reject" => Ok(ResponseKind::Reject),
            "revoke" => Ok(ResponseKind::Revoke),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// Durations offered when approving
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalDuration {
    OneDay,
    TwoDays,
    OneWeek,
    ThirtyDays,
}

impl ApprovalDuration {
    pub const ALL: [ApprovalDuration; 4] = [
        ApprovalDuration::OneDay,
        ApprovalDuration::TwoDays,
        ApprovalDuration::OneWeek,
        ApprovalDuration::ThirtyDays,
    ];

    pub fn hours(&self) -> u32 {
        match self {
            ApprovalDuration::OneDay => 24,
            ApprovalDuration::TwoDays => 48,
            ApprovalDuration::OneWeek => 168,
            ApprovalDuration::ThirtyDays => 720,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApprovalDuration::OneDay => "24h",
            ApprovalDuration::TwoDays => "48h",
            ApprovalDuration::OneWeek => "7d",
            ApprovalDuration::ThirtyDays => "30d",
        }
    }
}

impl AccessRequest {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        is_active(self.status, self.expires_at, now)
    }

    /// Status as it should be displayed: an approval past its expiry reads
    /// as expired even if the server has not rewritten it yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AccessStatus {
        if self.status == AccessStatus::Approved && !self.is_active(now) {
            AccessStatus::Expired
        } else {
            self.status
        }
    }

    /// Responses the patient may give right now
    pub fn available_responses(&self, now: DateTime<Utc>) -> Vec<ResponseKind> {
        match self.status {
            AccessStatus::Pending => vec![ResponseKind::Approve, ResponseKind::Reject],
            AccessStatus::Approved if self.is_active(now) => vec![ResponseKind::Revoke],
            _ => Vec::new(),
        }
    }

    /// Refuse a response the current state does not allow
    pub fn check_response(&self, response: &Response, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if let Response::Approve { duration_hours } = response {
            require_range(*duration_hours, MIN_DURATION_HOURS, MAX_DURATION_HOURS, "duration_hours")
                .into_result()?;
        }

        match response.kind() {
            ResponseKind::Approve | ResponseKind::Reject if self.status != AccessStatus::Pending => {
                Err(LifecycleError::invalid_state(
                    "access request",
                    format!("can only {} pending requests (status is {})", response.kind(), self.status),
                ))
            }
            ResponseKind::Revoke if !self.is_active(now) => Err(LifecycleError::invalid_state(
                "access request",
                format!(
                    "can only revoke active approved access (status is {})",
                    self.effective_status(now)
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Apply a response at `now`. Leaves the request untouched on error.
    pub fn apply_response(&mut self, response: &Response, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.check_response(response, now)?;
        match response {
            Response::Approve { duration_hours } => {
                self.status = AccessStatus::Approved;
                self.expires_at = Some(now + Duration::hours(i64::from(*duration_hours)));
                self.responded_at = Some(now);
            }
            Response::Reject => {
                self.status = AccessStatus::Rejected;
                self.responded_at = Some(now);
            }
            Response::Revoke => {
                self.status = AccessStatus::Revoked;
            }
        }
        self.server_is_active = self.is_active(now);
        Ok(())
    }

    pub fn scope_label(&self) -> String {
        scope_label(&self.scope)
    }

    /// Remaining time, e.g. "5h 12m left", "40m left", "<1m left" or "Expired"
    pub fn time_left_label(&self, now: DateTime<Utc>) -> String {
        let Some(expiry) = self.expires_at else {
            return "Expired".to_string();
        };
        let remaining = expiry - now;
        if remaining <= Duration::zero() {
            return "Expired".to_string();
        }
        let hours = remaining.num_hours();
        let minutes = remaining.num_minutes() % 60;
        if hours > 0 {
            format!("{}h {}m left", hours, minutes)
        } else if minutes > 0 {
            format!("{}m left", minutes)
        } else {
            "<1m left".to_string()
        }
    }

    /// Badge text for the doctor's request list
    pub fn badge(&self, now: DateTime<Utc>) -> &'static str {
        match self.effective_status(now) {
            AccessStatus::Pending => "Pending",
            AccessStatus::Approved => "Active",
            AccessStatus::Rejected => "Rejected",
            AccessStatus::Revoked => "Revoked",
            AccessStatus::Expired => "Expired",
        }
    }
}

/// Form input for a new access request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccessRequest {
    pub patient_id: String,
    pub scope: ScopeSelection,
    pub reason: String,
    pub duration_hours: u32,
}

/// Body of `POST /access/request/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateAccessRequestBody {
    pub patient_id: String,
    pub scope: Vec<ScopeTag>,
    pub reason: String,
    pub duration_hours: u32,
}

impl NewAccessRequest {
    pub fn new(patient_id: impl Into<String>, scope: ScopeSelection, reason: impl Into<String>, duration_hours: u32) -> Self {
        Self {
            patient_id: patient_id.into(),
            scope,
            reason: reason.into(),
            duration_hours,
        }
    }

    /// Check every field, reporting all failures together
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate_patient_code(&self.patient_id);
        if self.scope.is_empty() {
            result.add_error("scope", "select at least one document category", ValidationErrorCode::Empty);
        }
        result.merge(require_text(&self.reason, "reason"));
        result.merge(require_range(
            self.duration_hours,
            MIN_DURATION_HOURS,
            MAX_DURATION_HOURS,
            "duration_hours",
        ));
        result
    }

    pub fn to_body(&self) -> Result<CreateAccessRequestBody, ValidationErrors> {
        self.validate().into_result()?;
        Ok(CreateAccessRequestBody {
            patient_id: self.patient_id.trim().to_string(),
            scope: self.scope.to_scope()?,
            reason: self.reason.trim().to_string(),
            duration_hours: self.duration_hours,
        })
    }
}

/// Body of `POST /access/{id}/respond/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RespondBody {
    pub action: ResponseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_note: Option<String>,
}

impl RespondBody {
    pub fn new(response: &Response, patient_note: Option<String>) -> Self {
        let duration_hours = match response {
            Response::Approve { duration_hours } => Some(*duration_hours),
            _ => None,
        };
        Self {
            action: response.kind(),
            duration_hours,
            patient_note: patient_note.filter(|note| !note.trim().is_empty()),
        }
    }

    pub fn to_response(&self) -> Response {
        match self.action {
            ResponseKind::Approve => Response::Approve {
                duration_hours: self.duration_hours.unwrap_or(DEFAULT_APPROVAL_HOURS),
            },
            ResponseKind::Reject => Response::Reject,
            ResponseKind::Revoke => Response::Revoke,
        }
    }
}

/// Tabs on the patient's access screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestFilter {
    Pending,
    Approved,
    /// Approved and not yet expired
    Active,
    All,
}

impl RequestFilter {
    pub fn matches(&self, request: &AccessRequest, now: DateTime<Utc>) -> bool {
        match self {
            RequestFilter::Pending => request.status == AccessStatus::Pending,
            RequestFilter::Approved => request.status == AccessStatus::Approved,
            RequestFilter::Active => request.is_active(now),
            RequestFilter::All => true,
        }
    }

    pub fn apply<'a>(&self, requests: &'a [AccessRequest], now: DateTime<Utc>) -> Vec<&'a AccessRequest> {
        requests.iter().filter(|r| self.matches(r, now)).collect()
    }
}

impl std::str::FromStr for RequestFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestFilter::Pending),
            "approved" => Ok(RequestFilter::Approved),
            "active" => Ok(RequestFilter::Active),
            "all" => Ok(RequestFilter::All),
            other => Err(format!("unknown filter '{}'", other)),
        }
    }
}
