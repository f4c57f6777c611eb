//! In-memory item store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use passcore_common::{Error, ItemId, ItemIdentifier, Result, ShareId, UserId};

use crate::item::SymmetricallyEncryptedItem;
use crate::store::LocalItemStore;

type RecordKey = (UserId, ShareId, ItemId);

#[derive(Default)]
struct Records {
    next_sequence: u64,
    /// Insertion sequence plus record.
    entries: HashMap<RecordKey, (u64, SymmetricallyEncryptedItem)>,
}

impl Records {
    fn collect<F>(&self, user_id: &UserId, filter: F) -> Vec<SymmetricallyEncryptedItem>
    where
        F: Fn(&SymmetricallyEncryptedItem) -> bool,
    {
        let mut matching: Vec<_> = self
            .entries
            .iter()
            .filter(|((user, _, _), (_, item))| user == user_id && filter(item))
            .map(|(_, (sequence, item))| (*sequence, item.clone()))
            .collect();
        matching.sort_by_key(|(sequence, _)| *sequence);
        matching.into_iter().map(|(_, item)| item).collect()
    }
}

/// In-memory item store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
#[derive(Default)]
pub struct MemoryItemStore {
    records: RwLock<Records>,
}

impl MemoryItemStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Records>> {
        self.records
            .read()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Records>> {
        self.records
            .write()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }

    fn key(user_id: &UserId, item: &ItemIdentifier) -> RecordKey {
        (user_id.clone(), item.share_id.clone(), item.item_id.clone())
    }
}

#[async_trait]
impl LocalItemStore for MemoryItemStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, items: Vec<SymmetricallyEncryptedItem>) -> Result<()> {
        let mut guard = self.write()?;
        let records = &mut *guard;
        for item in items {
            let key = (item.user_id.clone(), item.share_id.clone(), item.item_id.clone());
            match records.entries.get_mut(&key) {
                Some((_, existing)) => *existing = item,
                None => {
                    let sequence = records.next_sequence;
                    records.next_sequence += 1;
                    records.entries.insert(key, (sequence, item));
                }
            }
        }
        Ok(())
    }

    async fn get_all(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        Ok(self.read()?.collect(user_id, |_| true))
    }

    async fn get_all_pinned(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        Ok(self.read()?.collect(user_id, |item| item.is_pinned))
    }

    async fn get_item(
        &self,
        user_id: &UserId,
        share_id: &ShareId,
        item_id: &ItemId,
    ) -> Result<Option<SymmetricallyEncryptedItem>> {
        let key = (user_id.clone(), share_id.clone(), item_id.clone());
        Ok(self.read()?.entries.get(&key).map(|(_, item)| item.clone()))
    }

    async fn delete(&self, user_id: &UserId, items: &[ItemIdentifier]) -> Result<usize> {
        let mut records = self.write()?;
        Ok(items
            .iter()
            .filter(|item| records.entries.remove(&Self::key(user_id, item)).is_some())
            .count())
    }

    async fn delete_share(&self, user_id: &UserId, share_id: &ShareId) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.entries.len();
        records
            .entries
            .retain(|(user, share, _), _| !(user == user_id && share == share_id));
        Ok(before - records.entries.len())
    }

    async fn set_pinned(&self, user_id: &UserId, item: &ItemIdentifier, pinned: bool) -> Result<()> {
        let mut records = self.write()?;
        match records.entries.get_mut(&Self::key(user_id, item)) {
            Some((_, existing)) => {
                existing.is_pinned = pinned;
                existing.item.pinned = pinned;
                Ok(())
            }
            None => Err(Error::NotFound(format!("Item not cached: {}", item))),
        }
    }
}
