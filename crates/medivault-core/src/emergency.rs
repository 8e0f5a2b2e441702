//! Break-glass emergency access
//!
//! A doctor self-grants one hour of access to a patient's critical documents
//! without consent. Every grant is reviewed once by an admin afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifecycleError;
use crate::validation::{require_text, validate_patient_code, ValidationErrors, ValidationResult};

/// Length of every emergency grant
pub fn emergency_window() -> Duration {
    Duration::hours(1)
}

/// Expiry of a grant issued at `granted_at`
pub fn expiry_for(granted_at: DateTime<Utc>) -> DateTime<Utc> {
    granted_at + emergency_window()
}

/// Whole minutes left before `expires_at`, never negative.
///
/// Display only. The server decides whether the window has lapsed.
pub fn minutes_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expires_at - now).num_milliseconds();
    millis.div_euclid(60_000).max(0)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyReason {
    LifeThreatening,
    Unconscious,
    MassCasualty,
    CriticalProcedure,
    Other,
}

impl EmergencyReason {
    pub const ALL: [EmergencyReason; 5] = [
        EmergencyReason::LifeThreatening,
        EmergencyReason::Unconscious,
        EmergencyReason::MassCasualty,
        EmergencyReason::CriticalProcedure,
        EmergencyReason::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EmergencyReason::LifeThreatening => "Life-Threatening Condition",
            EmergencyReason::Unconscious => "Patient Unconscious / Unable to Consent",
            EmergencyReason::MassCasualty => "Mass Casualty / Disaster",
            EmergencyReason::CriticalProcedure => "Critical Procedure Required",
            EmergencyReason::Other => "Other Emergency",
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            EmergencyReason::LifeThreatening => "LIFE_THREATENING",
            EmergencyReason::Unconscious => "UNCONSCIOUS",
            EmergencyReason::MassCasualty => "MASS_CASUALTY",
            EmergencyReason::CriticalProcedure => "CRITICAL_PROCEDURE",
            EmergencyReason::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for EmergencyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl std::str::FromStr for EmergencyReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        EmergencyReason::ALL
            .into_iter()
            .find(|reason| reason.wire_name() == normalized)
            .ok_or_else(|| format!("unknown emergency reason '{}'", s))
    }
}

/// Emergency grant as the server returns it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmergencyAccess {
    pub id: Uuid,
    pub doctor: Uuid,
    #[serde(default)]
    pub doctor_name: String,
    pub patient: Uuid,
    #[serde(default)]
    pub patient_name: String,
    pub reason_code: EmergencyReason,
    pub reason_detail: String,
    /// OPD/ER token or admission id
    pub patient_admit_id: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, rename = "is_active")]
    pub server_is_active: bool,
    #[serde(default)]
    pub is_reviewed_by_admin: bool,
    #[serde(default)]
    pub is_flagged_misuse: bool,
    #[serde(default)]
    pub admin_note: String,
}

/// Outcome of the admin's post-hoc review
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReviewStatus {
    PendingReview,
    Cleared,
    FlaggedMisuse,
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::PendingReview => "Pending Review",
            ReviewStatus::Cleared => "Reviewed",
            ReviewStatus::FlaggedMisuse => "Flagged",
        }
    }
}

/// Admin's review decision. Body of `POST /access/emergency/{id}/review/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewDecision {
    pub flag_misuse: bool,
    #[serde(default)]
    pub admin_note: String,
}

impl ReviewDecision {
    pub fn clear(note: impl Into<String>) -> Self {
        Self {
            flag_misuse: false,
            admin_note: note.into(),
        }
    }

    pub fn flag(note: impl Into<String>) -> Self {
        Self {
            flag_misuse: true,
            admin_note: note.into(),
        }
    }
}

impl EmergencyAccess {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn minutes_left(&self, now: DateTime<Utc>) -> i64 {
        minutes_left(self.expires_at, now)
    }

    /// Countdown text, e.g. "59 minutes"
    pub fn countdown_label(&self, now: DateTime<Utc>) -> String {
        let minutes = self.minutes_left(now);
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    }

    pub fn review_status(&self) -> ReviewStatus {
        match (self.is_reviewed_by_admin, self.is_flagged_misuse) {
            (false, _) => ReviewStatus::PendingReview,
            (true, false) => ReviewStatus::Cleared,
            (true, true) => ReviewStatus::FlaggedMisuse,
        }
    }

    pub fn can_review(&self) -> bool {
        !self.is_reviewed_by_admin
    }

    /// Record the admin's review. Single use: a reviewed grant is refused
    /// and keeps its first outcome.
    pub fn apply_review(&mut self, decision: &ReviewDecision) -> Result<(), LifecycleError> {
        if self.is_reviewed_by_admin {
            return Err(LifecycleError::invalid_state(
                "emergency access",
                format!("already reviewed ({})", self.review_status().label()),
            ));
        }
        self.is_reviewed_by_admin = true;
        self.is_flagged_misuse = decision.flag_misuse;
        self.admin_note = decision.admin_note.clone();
        Ok(())
    }
}

/// Form input for a break-glass grant. Also the request body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyGrant {
    pub patient_id: String,
    pub reason_code: EmergencyReason,
    pub reason_detail: String,
    pub patient_admit_id: String,
}

impl EmergencyGrant {
    pub fn new(
        patient_id: impl Into<String>,
        reason_code: EmergencyReason,
        reason_detail: impl Into<String>,
        patient_admit_id: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            reason_code,
            reason_detail: reason_detail.into(),
            patient_admit_id: patient_admit_id.into(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = validate_patient_code(&self.patient_id);
        result.merge(require_text(&self.reason_detail, "reason_detail"));
        result.merge(require_text(&self.patient_admit_id, "patient_admit_id"));
        result
    }

    /// Validated, trimmed copy ready to send
    pub fn to_body(&self) -> Result<EmergencyGrant, ValidationErrors> {
        self.validate().into_result()?;
        Ok(EmergencyGrant {
            patient_id: self.patient_id.trim().to_string(),
            reason_code: self.reason_code,
            reason_detail: self.reason_detail.trim().to_string(),
            patient_admit_id: self.patient_admit_id.trim().to_string(),
        })
    }
}

/// Admin view of emergency grants grouped by review outcome
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReviewBuckets {
    pub pending_review: Vec<EmergencyAccess>,
    pub cleared: Vec<EmergencyAccess>,
    pub flagged: Vec<EmergencyAccess>,
}

impl ReviewBuckets {
    pub fn from_grants(grants: impl IntoIterator<Item = EmergencyAccess>) -> Self {
        let mut buckets = ReviewBuckets::default();
        for grant in grants {
            match grant.review_status() {
                ReviewStatus::PendingReview => buckets.pending_review.push(grant),
                ReviewStatus::Cleared => buckets.cleared.push(grant),
                ReviewStatus::FlaggedMisuse => buckets.flagged.push(grant),
            }
        }
        buckets
    }

    pub fn unreviewed_count(&self) -> usize {
        self.pending_review.len()
    }

    pub fn total(&self) -> usize {
        self.pending_review.len() + self.cleared.len() + self.flagged.len()
    }
}
