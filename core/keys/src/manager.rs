//! Key manager resolving vault and item keys for the session.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use passcore_common::{Error, ItemRevision, KeyRotation, Result, ShareId, DEFAULT_PAGE_SIZE};
use passcore_crypto::{unwrap_item_key, unwrap_vault_key, ItemKey, UserKey, VaultKey};

use crate::keyring::KeyRing;
use crate::remote::{fetch_all_share_keys, RemoteShareKeyDatasource};

/// Resolves vault keys and item keys, fetching missing generations from the
/// remote key service.
///
/// Reads go through a shared lock on the key ring. Fetches are serialized per
/// share, so concurrent callers missing the same share wait for one fetch
/// instead of issuing their own.
pub struct PassKeyManager {
    remote: Arc<dyn RemoteShareKeyDatasource>,
    /// Unwraps vault keys delivered by the key service.
    user_key: UserKey,
    page_size: usize,
    ring: RwLock<KeyRing>,
    fetch_locks: Mutex<HashMap<ShareId, Arc<Mutex<()>>>>,
}

impl PassKeyManager {
    /// Create a manager using the default page size.
    pub fn new(remote: Arc<dyn RemoteShareKeyDatasource>, user_key: UserKey) -> Self {
        Self {
            remote,
            user_key,
            page_size: DEFAULT_PAGE_SIZE,
            ring: RwLock::new(KeyRing::new()),
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a manager with an explicit page size for key fetches.
    ///
    /// # Errors
    /// - `InvalidInput` if `page_size` is zero
    pub fn with_page_size(
        remote: Arc<dyn RemoteShareKeyDatasource>,
        user_key: UserKey,
        page_size: usize,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::InvalidInput("page size must be positive".to_string()));
        }
        Ok(Self {
            page_size,
            ..Self::new(remote, user_key)
        })
    }

    /// Key at the share's highest known rotation.
    ///
    /// Fetches the share's keys once if nothing is cached.
    ///
    /// # Errors
    /// - `CorruptedShareKeys` if no key is resolvable after the fetch
    /// - `Network` if the fetch fails
    pub async fn active_vault_key(&self, share_id: &ShareId) -> Result<VaultKey> {
        if let Some(key) = self.ring.read().await.active(share_id) {
            return Ok(key.clone());
        }

        self.fetch_if(share_id, |ring| ring.active(share_id).is_none())
            .await?;

        match self.ring.read().await.active(share_id) {
            Some(key) => Ok(key.clone()),
            None => {
                warn!(share_id = %share_id, "No vault key resolvable after fetch");
                Err(Error::CorruptedShareKeys(share_id.clone()))
            }
        }
    }

    /// Key of a specific historical generation.
    ///
    /// # Errors
    /// - `CorruptedShareKeys` if the share has no keys at all after a fetch
    /// - `KeyRotationUnresolvable` if other generations exist but not this one
    pub async fn vault_key(&self, share_id: &ShareId, rotation: KeyRotation) -> Result<VaultKey> {
        if let Some(key) = self.ring.read().await.get(share_id, rotation) {
            return Ok(key.clone());
        }

        self.fetch_if(share_id, |ring| ring.get(share_id, rotation).is_none())
            .await?;

        let ring = self.ring.read().await;
        if let Some(key) = ring.get(share_id, rotation) {
            return Ok(key.clone());
        }

        if ring.active(share_id).is_none() {
            warn!(share_id = %share_id, "Share has no vault keys");
            Err(Error::CorruptedShareKeys(share_id.clone()))
        } else {
            warn!(share_id = %share_id, rotation, "Vault key rotation unresolvable");
            Err(Error::KeyRotationUnresolvable {
                share_id: share_id.clone(),
                rotation,
            })
        }
    }

    /// Unwrap the key protecting one item revision.
    ///
    /// Uses the wrapped key carried by the revision, falling back to item key
    /// records from the key service.
    pub async fn item_key(&self, revision: &ItemRevision) -> Result<ItemKey> {
        let share_id = &revision.share_id;
        let vault_key = self.vault_key(share_id, revision.key_rotation).await?;

        if let Some(wrapped) = &revision.encrypted_item_key {
            return unwrap_item_key(&vault_key, wrapped);
        }

        let lookup = |ring: &KeyRing| {
            ring.share(share_id)
                .and_then(|set| set.item_key_record(&revision.item_id, revision.key_rotation))
                .map(str::to_owned)
        };

        let cached = lookup(&*self.ring.read().await);
        let wrapped = match cached {
            Some(wrapped) => wrapped,
            None => {
                self.fetch_if(share_id, |ring| lookup(ring).is_none()).await?;
                lookup(&*self.ring.read().await).ok_or_else(|| Error::ItemKeyUnavailable {
                    share_id: share_id.clone(),
                    item_id: revision.item_id.clone(),
                })?
            }
        };

        unwrap_item_key(&vault_key, &wrapped)
    }

    /// Fetch the share's keys again and merge any new generations.
    pub async fn refresh(&self, share_id: &ShareId) -> Result<()> {
        self.fetch_if(share_id, |_| true).await
    }

    /// Highest rotation currently cached for a share.
    pub async fn highest_known_rotation(&self, share_id: &ShareId) -> Option<KeyRotation> {
        self.ring.read().await.highest_known_rotation(share_id)
    }

    /// Drop cached keys of a share (vault removed or membership changed).
    pub async fn invalidate(&self, share_id: &ShareId) {
        if self.ring.write().await.invalidate(share_id) {
            info!(share_id = %share_id, "Invalidated cached share keys");
        }
        self.fetch_locks.lock().await.remove(share_id);
    }

    /// Drop every cached key.
    pub async fn invalidate_all(&self) {
        self.ring.write().await.clear();
        self.fetch_locks.lock().await.clear();
        info!("Invalidated all cached share keys");
    }

    async fn fetch_lock(&self, share_id: &ShareId) -> Arc<Mutex<()>> {
        self.fetch_locks
            .lock()
            .await
            .entry(share_id.clone())
            .or_default()
            .clone()
    }

    /// Fetch and merge the share's keys unless `needed` no longer holds once
    /// this caller owns the share's fetch lock.
    async fn fetch_if<F>(&self, share_id: &ShareId, needed: F) -> Result<()>
    where
        F: Fn(&KeyRing) -> bool,
    {
        let lock = self.fetch_lock(share_id).await;
        let _guard = lock.lock().await;

        if !needed(&*self.ring.read().await) {
            debug!(share_id = %share_id, "Keys fetched by a concurrent caller");
            return Ok(());
        }

        let keys = fetch_all_share_keys(self.remote.as_ref(), share_id, self.page_size).await?;

        // A generation that fails to unwrap is left out of the ring; callers
        // then see the share as corrupted or the rotation as unresolvable.
        let mut vault_keys = Vec::with_capacity(keys.vault_keys.len());
        for record in &keys.vault_keys {
            match unwrap_vault_key(&self.user_key, record.key_rotation, &record.key) {
                Ok(key) => vault_keys.push(key),
                Err(e) => warn!(
                    share_id = %share_id,
                    rotation = record.key_rotation,
                    error = %e,
                    "Skipping vault key that failed to unwrap"
                ),
            }
        }

        debug!(
            share_id = %share_id,
            vault_keys = vault_keys.len(),
            item_keys = keys.item_keys.len(),
            "Merging fetched share keys"
        );
        self.ring
            .write()
            .await
            .merge(share_id, vault_keys, keys.item_keys);

        Ok(())
    }
}
