//! Per-page view models.
//!
//! Every page is a set of named regions (clock, countdown, photo, ...).
//! A region is only written by the controller that owns its page; readers
//! are the HTTP handlers. Writing an unchanged value is a no-op, a changed
//! one is announced on the bus with the region's new content hash.

pub mod format;
pub mod view;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::bus::{BusEvent, PageKind, SharedBus};

#[derive(Debug, Clone, Serialize)]
struct Region {
    value: Value,
    sha: String,
}

/// Snapshot of one page as served to the screen shells
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub page: PageKind,
    pub regions: BTreeMap<String, Value>,
    pub shas: BTreeMap<String, String>,
}

pub struct DisplayStore {
    pages: RwLock<HashMap<PageKind, BTreeMap<String, Region>>>,
    bus: SharedBus,
}

pub type SharedDisplay = Arc<DisplayStore>;

impl DisplayStore {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Store a region value. Returns whether it changed.
    pub async fn update<T: Serialize>(&self, page: PageKind, region: &str, value: &T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(page = %page, region, "Could not serialize region: {}", e);
                return false;
            }
        };
        let sha = compute_region_sha(&value);

        {
            let mut pages = self.pages.write().await;
            let regions = pages.entry(page).or_default();
            if regions.get(region).is_some_and(|r| r.sha == sha) {
                return false;
            }
            regions.insert(
                region.to_string(),
                Region {
                    value,
                    sha: sha.clone(),
                },
            );
        }

        self.bus.publish(BusEvent::RegionUpdated {
            page,
            region: region.to_string(),
            sha,
        });
        true
    }

    pub async fn region(&self, page: PageKind, region: &str) -> Option<Value> {
        let pages = self.pages.read().await;
        pages
            .get(&page)
            .and_then(|regions| regions.get(region))
            .map(|r| r.value.clone())
    }

    pub async fn snapshot(&self, page: PageKind) -> PageSnapshot {
        let pages = self.pages.read().await;
        let mut regions = BTreeMap::new();
        let mut shas = BTreeMap::new();
        if let Some(stored) = pages.get(&page) {
            for (name, region) in stored {
                regions.insert(name.clone(), region.value.clone());
                shas.insert(name.clone(), region.sha.clone());
            }
        }
        PageSnapshot {
            page,
            regions,
            shas,
        }
    }

    /// Drop a page's regions, e.g. when its controller stops
    pub async fn clear(&self, page: PageKind) {
        self.pages.write().await.remove(&page);
    }
}

/// SHA256 of the region's JSON encoding (first 8 hex chars)
fn compute_region_sha(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..4])
}
