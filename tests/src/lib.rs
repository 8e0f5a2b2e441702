//! MediVault Scenario Tests
//!
//! End-to-end lifecycles against an in-memory server:
//! - Access requests: approve, expire, reject, revoke
//! - Break-glass emergency access and admin review
//! - Session refresh under concurrency and session teardown
//! - In-flight guard, list envelopes and fail-open dashboards
//! - Notification bell and background polling

pub mod fake_backend;

pub mod access_lifecycle;
pub mod emergency_review;
