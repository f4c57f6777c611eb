//! Sync phase tracking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use passcore_common::{ItemId, ShareId};

/// Where a share's sync pass currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SyncPhase {
    #[default]
    Idle,
    /// Waiting for the given page from the item service.
    Fetching { page: usize },
    /// Decrypting and storing the given page.
    Merging { page: usize },
}

/// Outcome of one sync pass over a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub share_id: ShareId,
    /// Pages fetched.
    pub pages: usize,
    /// Revisions written to the local cache.
    pub merged: usize,
    /// Revisions older than the cached copy.
    pub skipped: usize,
    /// Items that failed to decrypt and were left out.
    pub failed_items: Vec<ItemId>,
}

impl SyncReport {
    pub fn new(share_id: ShareId) -> Self {
        Self {
            share_id,
            pages: 0,
            merged: 0,
            skipped: 0,
            failed_items: Vec::new(),
        }
    }

    /// Whether every received revision was merged or deliberately skipped.
    pub fn is_clean(&self) -> bool {
        self.failed_items.is_empty()
    }
}

type Phases = Arc<RwLock<HashMap<ShareId, SyncPhase>>>;

/// Current phase of every share being synced. Absent shares are idle.
#[derive(Default)]
pub(crate) struct SyncTracker {
    phases: Phases,
}

impl SyncTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn phase(&self, share_id: &ShareId) -> SyncPhase {
        self.phases
            .read()
            .map(|phases| phases.get(share_id).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Start a pass. The share returns to idle when the pass is dropped,
    /// including when the sync future is cancelled.
    pub(crate) fn begin(&self, share_id: &ShareId) -> SyncPass {
        SyncPass {
            share_id: share_id.clone(),
            phases: self.phases.clone(),
        }
    }
}

pub(crate) struct SyncPass {
    share_id: ShareId,
    phases: Phases,
}

impl SyncPass {
    pub(crate) fn enter(&self, phase: SyncPhase) {
        if let Ok(mut phases) = self.phases.write() {
            phases.insert(self.share_id.clone(), phase);
        }
    }
}

impl Drop for SyncPass {
    fn drop(&mut self) {
        if let Ok(mut phases) = self.phases.write() {
            phases.remove(&self.share_id);
        }
    }
}
