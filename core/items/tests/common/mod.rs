//! Scripted remote collaborators for repository tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use passcore_common::{
    ClientConfig, Error, ItemContent, ItemContentData, ItemFlags, ItemId, ItemRevision,
    Result, ShareId, UserId,
};
use passcore_crypto::{wrap_vault_key, UserKey, VaultKey};
use passcore_items::payload::{encrypt_new_item, EncryptedItemPayload};
use passcore_items::{
    ItemRepository, ItemRevisionsPage, MoveItemsRequest, RemoteItemDatasource, UpdateItemRequest,
};
use passcore_keys::{PassKeyManager, RemoteShareKeyDatasource, ShareKeyRecord, ShareKeysPage};
use passcore_storage::{DeviceKeyProvider, LocalItemStore, MemoryItemStore, MemoryKeyStorage};

/// Key service serving wrapped vault keys per share, all in one page.
pub struct ScriptedKeyService {
    user_key: UserKey,
    /// Vault keys per share with the user key they are wrapped for.
    shares: Mutex<HashMap<ShareId, (UserKey, Vec<VaultKey>)>>,
    pub calls: AtomicUsize,
}

impl ScriptedKeyService {
    pub fn new(user_key: UserKey) -> Self {
        Self {
            user_key,
            shares: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn add_share(&self, share_id: &ShareId, keys: Vec<VaultKey>) {
        self.add_share_wrapped_for(share_id, keys, &self.user_key);
    }

    /// Serve keys wrapped for some other user's key.
    pub fn add_share_wrapped_for(&self, share_id: &ShareId, keys: Vec<VaultKey>, user_key: &UserKey) {
        self.shares
            .lock()
            .unwrap()
            .insert(share_id.clone(), (user_key.clone(), keys));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteShareKeyDatasource for ScriptedKeyService {
    async fn get_share_keys(
        &self,
        share_id: &ShareId,
        _page: usize,
        _page_size: usize,
    ) -> Result<ShareKeysPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let shares = self.shares.lock().unwrap();
        let vault_keys: Vec<ShareKeyRecord> = shares
            .get(share_id)
            .map(|(user_key, keys)| {
                keys.iter()
                    .map(|k| ShareKeyRecord {
                        key_rotation: k.rotation(),
                        key: wrap_vault_key(user_key, k).unwrap(),
                        create_time: 0,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ShareKeysPage {
            total: vault_keys.len(),
            vault_keys,
            item_keys: Vec::new(),
        })
    }
}

/// Item service holding revisions per share in memory.
#[derive(Default)]
pub struct ScriptedItemService {
    shares: Mutex<HashMap<ShareId, Vec<ItemRevision>>>,
    next_id: AtomicUsize,
    pub page_requests: Mutex<Vec<(ShareId, usize)>>,
    pub move_requests: Mutex<Vec<MoveItemsRequest>>,
    pub fail_moves: Mutex<bool>,
}

impl ScriptedItemService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, revision: ItemRevision) {
        let mut shares = self.shares.lock().unwrap();
        let revisions = shares.entry(revision.share_id.clone()).or_default();
        revisions.retain(|r| r.item_id != revision.item_id);
        revisions.push(revision);
    }

    pub fn revisions(&self, share_id: &ShareId) -> Vec<ItemRevision> {
        self.shares
            .lock()
            .unwrap()
            .get(share_id)
            .cloned()
            .unwrap_or_default()
    }

    fn find(&self, share_id: &ShareId, item_id: &ItemId) -> Result<ItemRevision> {
        self.revisions(share_id)
            .into_iter()
            .find(|r| &r.item_id == item_id)
            .ok_or_else(|| Error::NotFound(item_id.to_string()))
    }

    fn revision_from(&self, share_id: &ShareId, item_id: ItemId, payload: EncryptedItemPayload) -> ItemRevision {
        ItemRevision {
            item_id,
            share_id: share_id.clone(),
            revision: 1,
            content_format_version: payload.content_format_version,
            key_rotation: payload.key_rotation,
            encrypted_content: payload.content,
            encrypted_item_key: Some(payload.item_key),
            pinned: false,
            flags: ItemFlags::default(),
            last_use_time: None,
            modify_time: 0,
        }
    }

    fn fresh_id(&self) -> ItemId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        ItemId::new(format!("created-{n}")).unwrap()
    }
}

#[async_trait]
impl RemoteItemDatasource for ScriptedItemService {
    async fn get_item_revisions(
        &self,
        share_id: &ShareId,
        page: usize,
        page_size: usize,
    ) -> Result<ItemRevisionsPage> {
        self.page_requests
            .lock()
            .unwrap()
            .push((share_id.clone(), page));
        let revisions: Vec<ItemRevision> = self
            .revisions(share_id)
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .collect();
        Ok(ItemRevisionsPage {
            total: revisions.len(),
            revisions,
        })
    }

    async fn create_item(
        &self,
        share_id: &ShareId,
        request: EncryptedItemPayload,
    ) -> Result<ItemRevision> {
        let revision = self.revision_from(share_id, self.fresh_id(), request);
        self.put(revision.clone());
        Ok(revision)
    }

    async fn update_item(
        &self,
        share_id: &ShareId,
        item_id: &ItemId,
        request: UpdateItemRequest,
    ) -> Result<ItemRevision> {
        let mut revision = self.find(share_id, item_id)?;
        if revision.revision != request.last_revision {
            return Err(Error::InvalidInput("stale revision".to_string()));
        }
        revision.revision += 1;
        revision.encrypted_content = request.content;
        self.put(revision.clone());
        // The service omits the unchanged item key on updates.
        revision.encrypted_item_key = None;
        Ok(revision)
    }

    async fn move_items(
        &self,
        share_id: &ShareId,
        request: MoveItemsRequest,
    ) -> Result<Vec<ItemRevision>> {
        self.move_requests.lock().unwrap().push(request.clone());
        if *self.fail_moves.lock().unwrap() {
            return Err(Error::Network("connection reset".to_string()));
        }
        self.shares.lock().unwrap().remove(share_id);
        let moved: Vec<ItemRevision> = request
            .items
            .into_iter()
            .map(|payload| {
                self.revision_from(&request.destination_share_id, self.fresh_id(), payload)
            })
            .collect();
        for revision in &moved {
            self.put(revision.clone());
        }
        Ok(moved)
    }

    async fn set_item_pinned(
        &self,
        share_id: &ShareId,
        item_id: &ItemId,
        pinned: bool,
    ) -> Result<ItemRevision> {
        let mut revision = self.find(share_id, item_id)?;
        revision.pinned = pinned;
        revision.revision += 1;
        self.put(revision.clone());
        Ok(revision)
    }
}

/// A repository wired to scripted collaborators.
pub struct Harness {
    pub user: UserId,
    pub key_service: Arc<ScriptedKeyService>,
    pub item_service: Arc<ScriptedItemService>,
    pub store: Arc<dyn LocalItemStore>,
    pub keys: Arc<PassKeyManager>,
    pub device_keys: Arc<DeviceKeyProvider>,
    pub repository: ItemRepository,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_page_size(passcore_common::DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_store(page_size, Arc::new(MemoryItemStore::new()))
    }

    pub fn with_store(page_size: usize, store: Arc<dyn LocalItemStore>) -> Self {
        let item_service = Arc::new(ScriptedItemService::new());
        Self::build(page_size, store, item_service.clone(), item_service)
    }

    /// A harness whose repository talks to `remote` instead of the scripted
    /// item service.
    pub fn with_remote(page_size: usize, remote: Arc<dyn RemoteItemDatasource>) -> Self {
        Self::build(
            page_size,
            Arc::new(MemoryItemStore::new()),
            Arc::new(ScriptedItemService::new()),
            remote,
        )
    }

    fn build(
        page_size: usize,
        store: Arc<dyn LocalItemStore>,
        item_service: Arc<ScriptedItemService>,
        remote: Arc<dyn RemoteItemDatasource>,
    ) -> Self {
        let user_key = UserKey::generate();
        let key_service = Arc::new(ScriptedKeyService::new(user_key.clone()));
        let keys = Arc::new(PassKeyManager::new(key_service.clone(), user_key));
        let device_keys = Arc::new(DeviceKeyProvider::new(
            Arc::new(MemoryKeyStorage::new()),
            "device",
        ));
        let config = ClientConfig {
            page_size,
            ..ClientConfig::default()
        };
        let repository = ItemRepository::new(
            keys.clone(),
            store.clone(),
            remote,
            device_keys.clone(),
            &config,
        )
        .unwrap();

        Self {
            user: UserId::new("u1").unwrap(),
            key_service,
            item_service,
            store,
            keys,
            device_keys,
            repository,
        }
    }
}

pub fn share(id: &str) -> ShareId {
    ShareId::new(id).unwrap()
}

pub fn item_id(id: &str) -> ItemId {
    ItemId::new(id).unwrap()
}

pub fn note(name: &str, body: &str) -> ItemContent {
    ItemContent {
        name: name.to_string(),
        note: body.to_string(),
        item_uuid: format!("uuid-{name}"),
        data: ItemContentData::Note,
        extra_fields: Vec::new(),
        attachments: Vec::new(),
    }
}

/// A remote revision of `content` sealed for `vault_key`.
pub fn sealed_revision(
    vault_key: &VaultKey,
    share_id: &ShareId,
    item: &str,
    revision: u64,
    content: &ItemContent,
) -> ItemRevision {
    let payload = encrypt_new_item(vault_key, content).unwrap();
    ItemRevision {
        item_id: item_id(item),
        share_id: share_id.clone(),
        revision,
        content_format_version: payload.content_format_version,
        key_rotation: payload.key_rotation,
        encrypted_content: payload.content,
        encrypted_item_key: Some(payload.item_key),
        pinned: false,
        flags: ItemFlags::default(),
        last_use_time: None,
        modify_time: 0,
    }
}
