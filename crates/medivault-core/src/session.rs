//! Identity and role gating
//!
//! Maps the authenticated user to the lifecycle actions a client may offer.
//! The server still decides; this only keeps unavailable actions from being
//! presented as available.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifecycleError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Patient => write!(f, "PATIENT"),
            Role::Doctor => write!(f, "DOCTOR"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PATIENT" => Ok(Role::Patient),
            "DOCTOR" => Ok(Role::Doctor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
    #[default]
    #[serde(rename = "UNKNOWN", other)]
    Unknown,
}

impl std::fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
            BloodGroup::Unknown => "Unknown",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PatientProfile {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub city: String,
    pub state: String,
    pub blood_group: BloodGroup,
    /// Comma-separated, as stored by the server
    pub allergies: String,
    pub chronic_conditions: String,
    pub current_medications: String,
    pub special_notes: String,
    pub emergency_contact_name: String,
    pub emergency_contact_relation: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_verified: bool,
    pub auto_approve_access: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DoctorProfile {
    pub specialization: String,
    pub hospital_name: String,
    pub license_number: String,
    pub city: String,
    pub state: String,
    pub is_verified: bool,
}

/// Authenticated user as returned by `/auth/me/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    /// Human-readable patient identifier, patients only
    #[serde(default)]
    pub patient_id: Option<String>,
    pub is_active: bool,
    pub is_approved: bool,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
    #[serde(default)]
    pub patient_profile: Option<PatientProfile>,
    #[serde(default)]
    pub doctor_profile: Option<DoctorProfile>,
}

impl User {
    /// Active, not blocked, and (for doctors) approved by an admin.
    pub fn is_cleared(&self) -> bool {
        self.is_active && (self.role != Role::Doctor || self.is_approved)
    }

    pub fn display_name(&self) -> String {
        match self.role {
            Role::Doctor => format!("Dr. {}", self.full_name),
            _ => self.full_name.clone(),
        }
    }
}

/// Lifecycle actions a client can offer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    CreateAccessRequest,
    RespondToAccessRequest,
    GrantEmergencyAccess,
    ReviewEmergencyAccess,
    ViewPatientDocuments,
    ManageOwnDocuments,
    ViewEmergencySummary,
    ViewAuditLog,
    ManageUsers,
    ViewNotifications,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Action::CreateAccessRequest => "create access requests",
            Action::RespondToAccessRequest => "respond to access requests",
            Action::GrantEmergencyAccess => "grant emergency access",
            Action::ReviewEmergencyAccess => "review emergency access",
            Action::ViewPatientDocuments => "view patient documents",
            Action::ManageOwnDocuments => "manage own documents",
            Action::ViewEmergencySummary => "view emergency summaries",
            Action::ViewAuditLog => "view the audit log",
            Action::ManageUsers => "manage users",
            Action::ViewNotifications => "view notifications",
        };
        write!(f, "{}", label)
    }
}

/// Actions permitted for `user`.
///
/// Blocked users get nothing. An unapproved doctor can sign in and read
/// their own history but may not request or self-grant access.
pub fn permitted_actions(user: &User) -> Vec<Action> {
    if !user.is_active {
        return Vec::new();
    }

    let mut actions = vec![Action::ViewNotifications, Action::ViewAuditLog];
    match user.role {
        Role::Patient => {
            actions.push(Action::RespondToAccessRequest);
            actions.push(Action::ManageOwnDocuments);
            actions.push(Action::ViewEmergencySummary);
        }
        Role::Doctor => {
            if user.is_approved {
                actions.push(Action::CreateAccessRequest);
                actions.push(Action::GrantEmergencyAccess);
                actions.push(Action::ViewPatientDocuments);
                actions.push(Action::ViewEmergencySummary);
            }
        }
        Role::Admin => {
            actions.push(Action::ReviewEmergencyAccess);
            actions.push(Action::ManageUsers);
            actions.push(Action::ViewPatientDocuments);
            actions.push(Action::ViewEmergencySummary);
        }
    }
    actions
}

pub fn can(user: &User, action: Action) -> bool {
    permitted_actions(user).contains(&action)
}

/// Gate an action, naming the reason on refusal
pub fn require(user: &User, action: Action) -> Result<(), LifecycleError> {
    if can(user, action) {
        return Ok(());
    }
    let reason = if !user.is_active {
        format!("account {} is blocked", user.email)
    } else if user.role == Role::Doctor && !user.is_approved {
        format!("doctor account awaiting approval cannot {}", action)
    } else {
        format!("role {} cannot {}", user.role, action)
    };
    Err(LifecycleError::NotPermitted(reason))
}
