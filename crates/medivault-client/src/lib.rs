//! MediVault REST Client
//!
//! Async client for the MediVault records API:
//! - Session context with persistent tokens and single-flight refresh
//! - One method per endpoint, lists tolerant of paginated envelopes
//! - In-flight guard against concurrent mutations of one entity
//! - Background notification poller with a cancellation handle
//! - Dashboard boards that fail open and reload after each mutation
//!
//! Lifecycle rules come from `medivault-core`; the server stays
//! authoritative and every local check is only an early refusal.

pub mod api;
pub mod boards;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod inflight;
pub mod poller;
pub mod session;
pub mod transport;

pub use boards::{AdminDashboard, AdminEmergencyBoard, DoctorBoard, PatientAccessBoard};
pub use client::{ListPayload, MediVaultClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClientConfig;
pub use error::ApiError;
pub use poller::{NotificationPoller, PollerHandle};
pub use session::{FileTokenStore, MemoryTokenStore, Session, SessionState, TokenPair, TokenStore};
pub use transport::{ApiRequest, ApiResponse, Method, Transport};
