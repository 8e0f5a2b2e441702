use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::ApiError;

/// Entities with a lifecycle mutation outstanding
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` until the returned guard drops; fails fast if already claimed
    pub fn acquire(&self, id: Uuid) -> Result<InFlightGuard, ApiError> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id) {
            log::debug!("Rejecting concurrent change for {}", id);
            return Err(ApiError::Busy(id.to_string()));
        }
        Ok(InFlightGuard {
            id,
            ids: Arc::clone(&self.ids),
        })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).contains(&id)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    id: Uuid,
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.id);
    }
}
