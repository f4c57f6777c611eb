//! In-memory key cache, one entry per share.

use std::collections::{BTreeMap, HashMap};

use passcore_common::{ItemId, KeyRotation, ShareId};
use passcore_crypto::VaultKey;

use crate::remote::ItemKeyRecord;

/// Key generations known for one share.
#[derive(Debug, Default, Clone)]
pub struct ShareKeySet {
    rotations: BTreeMap<KeyRotation, VaultKey>,
    item_keys: HashMap<(ItemId, KeyRotation), String>,
}

impl ShareKeySet {
    /// Highest rotation cached for this share.
    pub fn highest_known_rotation(&self) -> Option<KeyRotation> {
        self.rotations.keys().next_back().copied()
    }

    /// Key at the highest known rotation.
    pub fn active(&self) -> Option<&VaultKey> {
        self.rotations.values().next_back()
    }

    pub fn get(&self, rotation: KeyRotation) -> Option<&VaultKey> {
        self.rotations.get(&rotation)
    }

    /// Cached rotations in ascending order.
    pub fn rotations(&self) -> impl Iterator<Item = KeyRotation> + '_ {
        self.rotations.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// Wrapped item key delivered by the key service, if any.
    pub fn item_key_record(&self, item_id: &ItemId, rotation: KeyRotation) -> Option<&str> {
        self.item_keys
            .get(&(item_id.clone(), rotation))
            .map(String::as_str)
    }
}

/// Per-share key generations for the session.
///
/// Rotation numbers are never reused, so merging a generation that is
/// already cached keeps the cached key.
#[derive(Debug, Default)]
pub struct KeyRing {
    shares: HashMap<ShareId, ShareKeySet>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge fetched generations and item key records into a share's set.
    pub fn merge(
        &mut self,
        share_id: &ShareId,
        vault_keys: impl IntoIterator<Item = VaultKey>,
        item_keys: impl IntoIterator<Item = ItemKeyRecord>,
    ) {
        let set = self.shares.entry(share_id.clone()).or_default();
        for key in vault_keys {
            set.rotations.entry(key.rotation()).or_insert(key);
        }
        for record in item_keys {
            set.item_keys
                .insert((record.item_id, record.key_rotation), record.key);
        }
    }

    pub fn share(&self, share_id: &ShareId) -> Option<&ShareKeySet> {
        self.shares.get(share_id)
    }

    /// Key at the share's highest known rotation.
    pub fn active(&self, share_id: &ShareId) -> Option<&VaultKey> {
        self.shares.get(share_id).and_then(ShareKeySet::active)
    }

    /// Key of a specific generation.
    pub fn get(&self, share_id: &ShareId, rotation: KeyRotation) -> Option<&VaultKey> {
        self.shares.get(share_id).and_then(|set| set.get(rotation))
    }

    pub fn highest_known_rotation(&self, share_id: &ShareId) -> Option<KeyRotation> {
        self.shares
            .get(share_id)
            .and_then(ShareKeySet::highest_known_rotation)
    }

    /// Drop everything cached for one share.
    pub fn invalidate(&mut self, share_id: &ShareId) -> bool {
        self.shares.remove(share_id).is_some()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.shares.clear();
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}
