//! Item repository orchestrating keys, cipher, local cache and remote.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use passcore_common::{
    ClientConfig, Error, ItemContent, ItemId, ItemIdentifier, ItemRevision, Result, ShareId,
    ShareRevision, UserId, VaultContent,
};
use passcore_crypto::DeviceKey;
use passcore_keys::PassKeyManager;
use passcore_storage::{DeviceKeyProvider, LocalItemStore, SymmetricallyEncryptedItem};

use crate::feed::{PinnedItemsFeed, PinnedItemsSubscription};
use crate::lock::KeyedLocks;
use crate::payload::{
    decrypt_item_content, encrypt_new_item, encrypt_update, open_item_bytes, seal_with_fresh_key,
    MoveItemsRequest,
};
use crate::remote::RemoteItemDatasource;
use crate::share::decrypt_share_content;
use crate::state::{SyncPhase, SyncReport, SyncTracker};

/// Orchestrates item reads, sync, moves and edits for a session.
///
/// Mutations of one user's cache are serialized, as are sync passes of one
/// share. Reads are not locked. Every change to a user's pinned set
/// re-publishes that user's pinned feed.
pub struct ItemRepository {
    keys: Arc<PassKeyManager>,
    store: Arc<dyn LocalItemStore>,
    remote: Arc<dyn RemoteItemDatasource>,
    device_keys: Arc<DeviceKeyProvider>,
    page_size: usize,
    pinned: StdMutex<HashMap<UserId, Arc<PinnedItemsFeed>>>,
    /// Serializes pinned-set queries with their publication.
    publish_lock: Mutex<()>,
    user_locks: KeyedLocks<UserId>,
    share_locks: KeyedLocks<ShareId>,
    sync_state: SyncTracker,
}

impl ItemRepository {
    /// # Errors
    /// - `InvalidInput` if the configured page size is zero
    pub fn new(
        keys: Arc<PassKeyManager>,
        store: Arc<dyn LocalItemStore>,
        remote: Arc<dyn RemoteItemDatasource>,
        device_keys: Arc<DeviceKeyProvider>,
        config: &ClientConfig,
    ) -> Result<Self> {
        if config.page_size == 0 {
            return Err(Error::InvalidInput("page_size must be positive".to_string()));
        }
        Ok(Self {
            keys,
            store,
            remote,
            device_keys,
            page_size: config.page_size,
            pinned: StdMutex::new(HashMap::new()),
            publish_lock: Mutex::new(()),
            user_locks: KeyedLocks::new(),
            share_locks: KeyedLocks::new(),
            sync_state: SyncTracker::new(),
        })
    }

    /// All cached items of a user. Never touches the network.
    pub async fn get_all_items(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        self.store.get_all(user_id).await
    }

    /// Cached pinned items of a user, also published on the pinned feed.
    pub async fn get_all_pinned_items(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SymmetricallyEncryptedItem>> {
        let _publish = self.publish_lock.lock().await;
        let items = self.store.get_all_pinned(user_id).await?;
        debug!(user_id = %user_id, count = items.len(), "Publishing pinned items");
        self.pinned_feed(user_id).publish(items.clone());
        Ok(items)
    }

    /// Attach to a user's live pinned feed.
    pub fn subscribe_pinned(&self, user_id: &UserId) -> PinnedItemsSubscription {
        self.pinned_feed(user_id).subscribe()
    }

    fn pinned_feed(&self, user_id: &UserId) -> Arc<PinnedItemsFeed> {
        // The map only gains entries; a poisoned guard still holds a valid map.
        self.pinned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user_id.clone())
            .or_default()
            .clone()
    }

    /// One cached item.
    pub async fn get_item(
        &self,
        user_id: &UserId,
        item: &ItemIdentifier,
    ) -> Result<Option<SymmetricallyEncryptedItem>> {
        self.store
            .get_item(user_id, &item.share_id, &item.item_id)
            .await
    }

    /// Decrypt a cached item with the device key.
    pub async fn open_item(&self, user_id: &UserId, item: &ItemIdentifier) -> Result<ItemContent> {
        let record = self.require_item(user_id, item).await?;
        record.decrypt_content(&self.device_key()?)
    }

    /// Current sync phase of a share.
    pub fn sync_phase(&self, share_id: &ShareId) -> SyncPhase {
        self.sync_state.phase(share_id)
    }

    /// Pull every revision of a share into the local cache.
    ///
    /// Pages are fetched one at a time until the service reports a short
    /// page. Items that fail to decrypt are logged and reported, not stored.
    /// Revisions older than the cached copy are skipped.
    ///
    /// # Errors
    /// - `CorruptedShareKeys` aborts the pass; pages already merged remain
    /// - `Network` from the item or key service aborts the pass
    pub async fn sync_revisions(&self, user_id: &UserId, share_id: &ShareId) -> Result<SyncReport> {
        let share_lock = self.share_locks.get(share_id).await;
        let _sync = share_lock.lock().await;
        let pass = self.sync_state.begin(share_id);
        let device_key = self.device_key()?;

        let mut report = SyncReport::new(share_id.clone());
        let mut page = 0;

        loop {
            pass.enter(SyncPhase::Fetching { page });
            let response = self
                .remote
                .get_item_revisions(share_id, page, self.page_size)
                .await?;
            report.pages += 1;

            debug!(
                share_id = %share_id,
                page,
                revisions = response.revisions.len(),
                total = response.total,
                "Fetched item revision page"
            );

            pass.enter(SyncPhase::Merging { page });
            self.merge_page(user_id, response.revisions, &device_key, &mut report)
                .await?;

            if response.total != self.page_size {
                break;
            }
            page += 1;
        }

        info!(
            share_id = %share_id,
            pages = report.pages,
            merged = report.merged,
            skipped = report.skipped,
            failed = report.failed_items.len(),
            "Share sync complete"
        );
        Ok(report)
    }

    async fn merge_page(
        &self,
        user_id: &UserId,
        revisions: Vec<ItemRevision>,
        device_key: &DeviceKey,
        report: &mut SyncReport,
    ) -> Result<()> {
        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let revisions = latest_per_item(revisions, report);
        let mut batch = Vec::with_capacity(revisions.len());
        let mut pinned_changed = false;

        for revision in revisions {
            let cached = self
                .store
                .get_item(user_id, &revision.share_id, &revision.item_id)
                .await?;

            if let Some(cached) = &cached {
                if cached.item.revision > revision.revision {
                    debug!(
                        item_id = %revision.item_id,
                        cached = cached.item.revision,
                        incoming = revision.revision,
                        "Skipping stale revision"
                    );
                    report.skipped += 1;
                    continue;
                }
            }

            match self.decrypt_revision(&revision).await {
                Ok(content) => {
                    pinned_changed |= revision.pinned || cached.is_some_and(|c| c.is_pinned);
                    batch.push(SymmetricallyEncryptedItem::seal(
                        user_id.clone(),
                        revision,
                        &content,
                        device_key,
                    )?);
                }
                Err(e) if e.is_share_fatal() || e.is_transient() => {
                    error!(
                        share_id = %revision.share_id,
                        item_id = %revision.item_id,
                        error = %e,
                        "Aborting share sync"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        share_id = %revision.share_id,
                        item_id = %revision.item_id,
                        rotation = revision.key_rotation,
                        error = %e,
                        "Skipping item that failed to decrypt"
                    );
                    report.failed_items.push(revision.item_id);
                }
            }
        }

        report.merged += batch.len();
        if !batch.is_empty() {
            self.store.upsert(batch).await?;
        }
        if pinned_changed {
            self.get_all_pinned_items(user_id).await?;
        }
        Ok(())
    }

    /// Move items to another vault.
    ///
    /// Every item is re-encrypted under a fresh item key wrapped by the
    /// destination's active vault key. If any item cannot be re-encrypted
    /// nothing is sent. The local cache changes only after the service
    /// confirms the batch; device-key ciphertext is carried over unchanged.
    ///
    /// # Returns
    /// The cached records as they are after the move.
    pub async fn move_items(
        &self,
        user_id: &UserId,
        item_ids: &[ItemId],
        from: &ShareId,
        to: &ShareId,
    ) -> Result<Vec<SymmetricallyEncryptedItem>> {
        if from == to {
            return Err(Error::InvalidInput(format!(
                "Cannot move items from share {} to itself",
                from
            )));
        }
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let destination_key = self.keys.active_vault_key(to).await?;

        let mut cached = Vec::with_capacity(item_ids.len());
        let mut payloads = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let identifier = ItemIdentifier::new(from.clone(), item_id.clone());
            let record = self.require_item(user_id, &identifier).await?;

            let item_key = self.keys.item_key(&record.item).await?;
            let mut plaintext = open_item_bytes(&item_key, &record.item.encrypted_content)?;
            let payload = seal_with_fresh_key(
                &destination_key,
                &plaintext,
                record.item.content_format_version,
            );
            plaintext.zeroize();

            payloads.push(payload?);
            cached.push(record);
        }

        info!(
            from = %from,
            to = %to,
            count = payloads.len(),
            rotation = destination_key.rotation(),
            "Submitting item move"
        );
        let moved = self
            .remote
            .move_items(
                from,
                MoveItemsRequest {
                    destination_share_id: to.clone(),
                    items: payloads,
                },
            )
            .await?;

        if moved.len() != cached.len() {
            return Err(Error::Network(format!(
                "Move returned {} revisions for {} items",
                moved.len(),
                cached.len()
            )));
        }

        let removed: Vec<ItemIdentifier> = cached.iter().map(|r| r.identifier()).collect();
        let pinned_changed = cached.iter().any(|r| r.is_pinned) || moved.iter().any(|r| r.pinned);
        let records: Vec<SymmetricallyEncryptedItem> = cached
            .into_iter()
            .zip(moved)
            .map(|(record, revision)| record.with_revision(revision))
            .collect();

        self.store.delete(user_id, &removed).await?;
        self.store.upsert(records.clone()).await?;
        if pinned_changed {
            self.get_all_pinned_items(user_id).await?;
        }

        Ok(records)
    }

    /// Create an item in a share.
    pub async fn create_item(
        &self,
        user_id: &UserId,
        share_id: &ShareId,
        content: &ItemContent,
    ) -> Result<SymmetricallyEncryptedItem> {
        let device_key = self.device_key()?;
        let vault_key = self.keys.active_vault_key(share_id).await?;
        let payload = encrypt_new_item(&vault_key, content)?;

        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let revision = self.remote.create_item(share_id, payload).await?;
        info!(share_id = %share_id, item_id = %revision.item_id, "Created item");

        self.commit(user_id, revision, content, &device_key, false)
            .await
    }

    /// Replace an item's content, keeping its item key.
    ///
    /// The update carries the cached revision number; the service rejects it
    /// if the item changed remotely since the last sync.
    pub async fn update_item(
        &self,
        user_id: &UserId,
        item: &ItemIdentifier,
        content: &ItemContent,
    ) -> Result<SymmetricallyEncryptedItem> {
        let device_key = self.device_key()?;

        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let cached = self.require_item(user_id, item).await?;
        let item_key = self.keys.item_key(&cached.item).await?;
        let request = encrypt_update(
            &item_key,
            cached.item.key_rotation,
            cached.item.revision,
            content,
        )?;

        let mut revision = self
            .remote
            .update_item(&item.share_id, &item.item_id, request)
            .await?;
        if revision.encrypted_item_key.is_none() {
            revision.encrypted_item_key = cached.item.encrypted_item_key.clone();
        }
        info!(item = %item, revision = revision.revision, "Updated item");

        self.commit(user_id, revision, content, &device_key, cached.is_pinned)
            .await
    }

    /// Pin or unpin an item through the item service.
    pub async fn pin_item(
        &self,
        user_id: &UserId,
        item: &ItemIdentifier,
        pinned: bool,
    ) -> Result<SymmetricallyEncryptedItem> {
        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let cached = self.require_item(user_id, item).await?;
        let mut revision = self
            .remote
            .set_item_pinned(&item.share_id, &item.item_id, pinned)
            .await?;
        if revision.encrypted_item_key.is_none() {
            revision.encrypted_item_key = cached.item.encrypted_item_key.clone();
        }

        let record = cached.with_revision(revision);
        self.store.upsert(vec![record.clone()]).await?;
        self.get_all_pinned_items(user_id).await?;

        debug!(item = %item, pinned = record.is_pinned, "Pin state changed");
        Ok(record)
    }

    /// Drop items from the local cache only.
    pub async fn delete_local_items(
        &self,
        user_id: &UserId,
        items: &[ItemIdentifier],
    ) -> Result<usize> {
        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let removed = self.store.delete(user_id, items).await?;
        if removed > 0 {
            self.get_all_pinned_items(user_id).await?;
        }
        Ok(removed)
    }

    /// Forget a vault: its cached items and its keys.
    pub async fn remove_share(&self, user_id: &UserId, share_id: &ShareId) -> Result<usize> {
        let user_lock = self.user_locks.get(user_id).await;
        let _write = user_lock.lock().await;

        let removed = self.store.delete_share(user_id, share_id).await?;
        self.keys.invalidate(share_id).await;
        self.get_all_pinned_items(user_id).await?;

        info!(share_id = %share_id, removed, "Removed share from local cache");
        Ok(removed)
    }

    /// Decrypt a vault's name and description.
    pub async fn vault_content(&self, share: &ShareRevision) -> Result<Option<VaultContent>> {
        decrypt_share_content(&self.keys, share).await
    }

    async fn commit(
        &self,
        user_id: &UserId,
        revision: ItemRevision,
        content: &ItemContent,
        device_key: &DeviceKey,
        was_pinned: bool,
    ) -> Result<SymmetricallyEncryptedItem> {
        let pinned_changed = was_pinned || revision.pinned;
        let record = SymmetricallyEncryptedItem::seal(user_id.clone(), revision, content, device_key)?;
        self.store.upsert(vec![record.clone()]).await?;
        if pinned_changed {
            self.get_all_pinned_items(user_id).await?;
        }
        Ok(record)
    }

    async fn decrypt_revision(&self, revision: &ItemRevision) -> Result<ItemContent> {
        let item_key = self.keys.item_key(revision).await?;
        decrypt_item_content(&item_key, &revision.encrypted_content)
    }

    async fn require_item(
        &self,
        user_id: &UserId,
        item: &ItemIdentifier,
    ) -> Result<SymmetricallyEncryptedItem> {
        self.get_item(user_id, item)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Item {} is not cached", item)))
    }

    fn device_key(&self) -> Result<DeviceKey> {
        self.device_keys.get_or_create()
    }
}

/// Collapse repeated `(share, item)` entries of one page to the highest
/// revision, keeping first-seen order. Dropped entries count as skipped.
fn latest_per_item(revisions: Vec<ItemRevision>, report: &mut SyncReport) -> Vec<ItemRevision> {
    let mut index: HashMap<(ShareId, ItemId), usize> = HashMap::with_capacity(revisions.len());
    let mut latest: Vec<ItemRevision> = Vec::with_capacity(revisions.len());

    for revision in revisions {
        let key = (revision.share_id.clone(), revision.item_id.clone());
        match index.get(&key) {
            Some(&slot) => {
                debug!(
                    item_id = %revision.item_id,
                    kept = latest[slot].revision.max(revision.revision),
                    "Duplicate revision in page"
                );
                if revision.revision > latest[slot].revision {
                    latest[slot] = revision;
                }
                report.skipped += 1;
            }
            None => {
                index.insert(key, latest.len());
                latest.push(revision);
            }
        }
    }
    latest
}
