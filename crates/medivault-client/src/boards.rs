//! Dashboard boards
//!
//! Each board is a snapshot of one role's working lists. Loads fail open to
//! empty lists with a warning. Mutations go through the client and the
//! board re-fetches afterwards rather than merging the response.

use std::future::Future;

use chrono::{DateTime, Utc};
use medivault_core::records::AdminStats;
use medivault_core::{AccessRequest, AccessStatus, EmergencyAccess, RequestFilter, Response, ReviewBuckets, ReviewDecision};
use uuid::Uuid;

use crate::client::MediVaultClient;
use crate::error::ApiError;

/// How many emergencies the admin dashboard lists
pub const RECENT_EMERGENCIES: usize = 5;

async fn load_or_empty<T, F>(what: &str, load: F) -> Vec<T>
where
    F: Future<Output = Result<Vec<T>, ApiError>>,
{
    match load.await {
        Ok(items) => items,
        Err(e) => {
            log::warn!("Failed to load {}: {}", what, e);
            Vec::new()
        }
    }
}

/// Patient's incoming access requests
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatientAccessBoard {
    pub requests: Vec<AccessRequest>,
}

impl PatientAccessBoard {
    pub async fn load(client: &MediVaultClient) -> Self {
        Self {
            requests: load_or_empty("incoming access requests", client.incoming_requests(None)).await,
        }
    }

    pub async fn reload(&mut self, client: &MediVaultClient) {
        *self = Self::load(client).await;
    }

    pub fn pending_count(&self) -> usize {
        self.requests.iter().filter(|r| r.status == AccessStatus::Pending).count()
    }

    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.requests.iter().filter(|r| r.is_active(now)).count()
    }

    pub fn filtered(&self, filter: RequestFilter, now: DateTime<Utc>) -> Vec<&AccessRequest> {
        filter.apply(&self.requests, now)
    }

    pub fn find(&self, id: Uuid) -> Option<&AccessRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    /// Respond to one of the listed requests, then reload the list
    pub async fn respond(
        &mut self,
        client: &MediVaultClient,
        id: Uuid,
        response: &Response,
        patient_note: Option<String>,
    ) -> Result<AccessRequest, ApiError> {
        let request = self
            .find(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("access request {}", id)))?;
        let updated = client.respond(&request, response, patient_note).await?;
        self.reload(client).await;
        Ok(updated)
    }
}

/// Doctor's own requests and emergency grants
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DoctorBoard {
    pub requests: Vec<AccessRequest>,
    pub emergencies: Vec<EmergencyAccess>,
}

impl DoctorBoard {
    pub async fn load(client: &MediVaultClient) -> Self {
        Self {
            requests: load_or_empty("access requests", client.my_requests()).await,
            emergencies: load_or_empty("emergency grants", client.my_emergencies()).await,
        }
    }

    pub async fn reload(&mut self, client: &MediVaultClient) {
        *self = Self::load(client).await;
    }

    pub fn active_requests(&self, now: DateTime<Utc>) -> Vec<&AccessRequest> {
        RequestFilter::Active.apply(&self.requests, now)
    }

    pub fn pending_requests(&self, now: DateTime<Utc>) -> Vec<&AccessRequest> {
        RequestFilter::Pending.apply(&self.requests, now)
    }

    pub fn active_emergencies(&self, now: DateTime<Utc>) -> Vec<&EmergencyAccess> {
        self.emergencies.iter().filter(|g| g.is_active(now)).collect()
    }
}

/// All emergency grants, bucketed by review outcome
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdminEmergencyBoard {
    pub buckets: ReviewBuckets,
}

impl AdminEmergencyBoard {
    pub async fn load(client: &MediVaultClient) -> Self {
        let grants = load_or_empty("emergency grants", client.all_emergencies()).await;
        Self {
            buckets: ReviewBuckets::from_grants(grants),
        }
    }

    pub async fn reload(&mut self, client: &MediVaultClient) {
        *self = Self::load(client).await;
    }

    pub fn unreviewed_count(&self) -> usize {
        self.buckets.unreviewed_count()
    }

    pub fn find(&self, id: Uuid) -> Option<&EmergencyAccess> {
        self.buckets
            .pending_review
            .iter()
            .chain(&self.buckets.cleared)
            .chain(&self.buckets.flagged)
            .find(|g| g.id == id)
    }

    /// Review one grant, then reload
    pub async fn review(
        &mut self,
        client: &MediVaultClient,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<EmergencyAccess, ApiError> {
        let grant = self
            .find(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("emergency access {}", id)))?;
        let reviewed = client.review_emergency(&grant, decision).await?;
        self.reload(client).await;
        Ok(reviewed)
    }
}

/// Admin landing page: counters plus the latest emergencies
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdminDashboard {
    pub stats: AdminStats,
    pub recent_emergencies: Vec<EmergencyAccess>,
}

impl AdminDashboard {
    pub async fn load(client: &MediVaultClient) -> Self {
        let stats = match client.admin_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                log::warn!("Failed to load admin stats: {}", e);
                AdminStats::default()
            }
        };
        let mut emergencies = load_or_empty("emergency grants", client.all_emergencies()).await;
        emergencies.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        emergencies.truncate(RECENT_EMERGENCIES);
        Self {
            stats,
            recent_emergencies: emergencies,
        }
    }
}
