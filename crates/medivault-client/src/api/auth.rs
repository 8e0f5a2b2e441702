//! Login, registration, OTP and profile endpoints

use chrono::NaiveDate;
use medivault_core::session::{BloodGroup, DoctorProfile, PatientProfile};
use medivault_core::validation::{require_text, ValidationErrorCode};
use medivault_core::User;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::client::MediVaultClient;
use crate::error::ApiError;
use crate::session::TokenPair;
use crate::transport::ApiRequest;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Tokens plus the account they belong to
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub user: User,
    pub access: String,
    pub refresh: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OtpSent {
    pub message: String,
    pub phone: String,
    /// Only present when the server runs in development mode
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientMatch {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub patient_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PatientRegistration {
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<PatientProfile>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DoctorRegistration {
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub password: String,
    pub doctor_profile: DoctorProfile,
}

/// Partial update for `PATCH /auth/me/`
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<PatientProfilePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_profile: Option<DoctorProfilePatch>,
}

/// Patient profile fields to change; unset fields are left alone by the server.
/// `emergency_contact_verified` is server-controlled and never sent.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct PatientProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<BloodGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chronic_conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_medications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_approve_access: Option<bool>,
}

/// Doctor profile fields to change. Verification is set by admins only.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct DoctorProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

fn check_account(email: &str, full_name: &str, password: &str) -> Result<(), ApiError> {
    let mut result = require_text(email, "email");
    result.merge(require_text(full_name, "full_name"));
    if password.chars().count() < MIN_PASSWORD_LEN {
        result.add_error(
            "password",
            "password must be at least 8 characters",
            ValidationErrorCode::OutOfRange,
        );
    }
    Ok(result.into_result()?)
}

impl MediVaultClient {
    /// Email/password login, then load the profile
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let mut result = require_text(email, "email");
        result.merge(require_text(password, "password"));
        result.into_result()?;

        let request = ApiRequest::post("/auth/login/", json!({ "email": email.trim(), "password": password }));
        let tokens: TokenPair = self.send_public(request).await?.json()?;
        self.session().establish(tokens, None).await;

        match self.me().await {
            Ok(user) => {
                log::info!("Logged in as {} ({})", user.email, user.role);
                Ok(user)
            }
            Err(e) => {
                self.session().teardown().await;
                Err(e)
            }
        }
    }

    pub async fn request_otp(&self, phone: &str) -> Result<OtpSent, ApiError> {
        require_text(phone, "phone").into_result()?;
        let request = ApiRequest::post("/auth/otp/request/", json!({ "phone": phone.trim() }));
        self.send_public(request).await?.json()
    }

    /// Patient phone login; creates the account on first use
    pub async fn verify_otp(&self, phone: &str, otp: &str) -> Result<User, ApiError> {
        let mut result = require_text(phone, "phone");
        result.merge(require_text(otp, "otp"));
        result.into_result()?;

        let request = ApiRequest::post("/auth/otp/verify/", json!({ "phone": phone.trim(), "otp": otp.trim() }));
        let auth: AuthResponse = self.send_public(request).await?.json()?;
        Ok(self.establish(auth).await)
    }

    pub async fn register_patient(&self, registration: &PatientRegistration) -> Result<User, ApiError> {
        check_account(&registration.email, &registration.full_name, &registration.password)?;
        let request = ApiRequest::post("/auth/register/patient/", serde_json::to_value(registration)?);
        let auth: AuthResponse = self.send_public(request).await?.json()?;
        Ok(self.establish(auth).await)
    }

    /// Doctor accounts stay unable to create or grant until an admin approves them
    pub async fn register_doctor(&self, registration: &DoctorRegistration) -> Result<User, ApiError> {
        check_account(&registration.email, &registration.full_name, &registration.password)?;
        let request = ApiRequest::post("/auth/register/doctor/", serde_json::to_value(registration)?);
        let auth: AuthResponse = self.send_public(request).await?.json()?;
        Ok(self.establish(auth).await)
    }

    async fn establish(&self, auth: AuthResponse) -> User {
        let tokens = TokenPair {
            access: auth.access,
            refresh: auth.refresh,
        };
        self.session().establish(tokens, Some(auth.user.clone())).await;
        log::info!("Signed in as {} ({})", auth.user.email, auth.user.role);
        auth.user
    }

    /// Current user; also refreshes the cached copy used by the role gate
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.get("/auth/me/").await?;
        self.session().set_user(user.clone()).await;
        Ok(user)
    }

    pub async fn update_me(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let user: User = self.patch("/auth/me/", update).await?;
        self.session().set_user(user.clone()).await;
        Ok(user)
    }

    /// Resume a persisted session, if any
    pub async fn restore(&self) -> Result<Option<User>, ApiError> {
        if self.session().tokens().await.is_none() {
            return Ok(None);
        }
        match self.me().await {
            Ok(user) => Ok(Some(user)),
            Err(ApiError::Auth(reason)) => {
                log::info!("Saved session is no longer valid: {}", reason);
                self.session().teardown().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self) {
        self.session().teardown().await;
    }

    /// Patients whose patient id contains `query` (doctors and admins)
    pub async fn search_patients(&self, query: &str) -> Result<Vec<PatientMatch>, ApiError> {
        self.get_list("/auth/patients/search/", vec![("q".to_string(), query.trim().to_string())])
            .await
    }
}
