use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::store::{KvStore, read_json, write_json};
use crate::model::EntityId;
use crate::util::clock::Clock;

/// Key of the write-time map shared by every cached payload
pub const TIMESTAMPS_KEY: &str = "checklist-timestamps";

/// Where the displayed checklists came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Fetched from the network
    #[default]
    Fresh,
    /// Served from a cache entry within its TTL
    Cached,
    /// A cache entry exists but is past its TTL
    Expired,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Cached => "cached",
            CacheStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached raw payload. Expired entries are still returned; the caller
/// decides whether to use them.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: Value,
    pub written_at: Option<DateTime<Utc>>,
    pub status: CacheStatus,
}

impl CacheEntry {
    pub fn is_usable(&self) -> bool {
        self.status == CacheStatus::Cached
    }
}

pub fn payload_key(project_id: &EntityId) -> String {
    format!("checklists-{project_id}")
}

/// Raw checklist payloads per project, with TTL-based staleness.
/// Every storage failure is logged and treated as a miss.
#[derive(Clone)]
pub struct ChecklistCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ChecklistCache {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        ChecklistCache { store, clock, ttl }
    }

    pub fn read(&self, project_id: &EntityId) -> Option<CacheEntry> {
        let key = payload_key(project_id);
        let payload = match read_json::<Value>(self.store.as_ref(), &key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed");
                return None;
            }
        };

        let written_at = self.timestamps().get(&key).copied();
        let status = match written_at {
            Some(at) if self.within_ttl(at) => CacheStatus::Cached,
            _ => CacheStatus::Expired,
        };
        debug!(%key, %status, "cache hit");
        Some(CacheEntry {
            payload,
            written_at,
            status,
        })
    }

    pub fn write(&self, project_id: &EntityId, payload: &Value) {
        let key = payload_key(project_id);
        if let Err(e) = write_json(self.store.as_ref(), &key, payload) {
            warn!(%key, error = %e, "cache write failed");
            return;
        }
        let mut stamps = self.timestamps();
        stamps.insert(key, self.clock.now());
        self.save_timestamps(&stamps);
    }

    pub fn invalidate(&self, project_id: &EntityId) {
        let key = payload_key(project_id);
        if let Err(e) = self.store.remove(&key) {
            warn!(%key, error = %e, "cache invalidate failed");
        }
        let mut stamps = self.timestamps();
        if stamps.remove(&key).is_some() {
            self.save_timestamps(&stamps);
        }
    }

    fn within_ttl(&self, written_at: DateTime<Utc>) -> bool {
        match (self.clock.now() - written_at).to_std() {
            Ok(age) => age < self.ttl,
            // written "in the future": the clock moved backwards
            Err(_) => true,
        }
    }

    fn timestamps(&self) -> BTreeMap<String, DateTime<Utc>> {
        match read_json(self.store.as_ref(), TIMESTAMPS_KEY) {
            Ok(stamps) => stamps.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "cache timestamps unreadable");
                BTreeMap::new()
            }
        }
    }

    fn save_timestamps(&self, stamps: &BTreeMap<String, DateTime<Utc>>) {
        if let Err(e) = write_json(self.store.as_ref(), TIMESTAMPS_KEY, stamps) {
            warn!(error = %e, "cache timestamps write failed");
        }
    }
}
