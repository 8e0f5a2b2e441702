//! Endpoint methods on [`crate::MediVaultClient`], grouped by server area

pub mod access;
pub mod admin;
pub mod auth;
pub mod documents;
pub mod emergency;
pub mod notifications;

pub use auth::{
    AuthResponse, DoctorProfilePatch, DoctorRegistration, OtpSent, PatientMatch, PatientProfilePatch, PatientRegistration,
    ProfileUpdate,
};
