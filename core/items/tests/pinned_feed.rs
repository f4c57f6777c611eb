mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use passcore_common::{ItemId, ItemIdentifier, Result, ShareId, UserId};
use passcore_crypto::VaultKey;
use passcore_storage::{LocalItemStore, MemoryItemStore, SymmetricallyEncryptedItem};

use common::{item_id, note, sealed_revision, share, Harness};

/// Memory store counting pinned-set queries.
#[derive(Default)]
struct CountingStore {
    inner: MemoryItemStore,
    pinned_queries: AtomicUsize,
}

#[async_trait]
impl LocalItemStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn upsert(&self, items: Vec<SymmetricallyEncryptedItem>) -> Result<()> {
        self.inner.upsert(items).await
    }

    async fn get_all(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        self.inner.get_all(user_id).await
    }

    async fn get_all_pinned(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        self.pinned_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all_pinned(user_id).await
    }

    async fn get_item(
        &self,
        user_id: &UserId,
        share_id: &ShareId,
        item_id: &ItemId,
    ) -> Result<Option<SymmetricallyEncryptedItem>> {
        self.inner.get_item(user_id, share_id, item_id).await
    }

    async fn delete(&self, user_id: &UserId, items: &[ItemIdentifier]) -> Result<usize> {
        self.inner.delete(user_id, items).await
    }

    async fn delete_share(&self, user_id: &UserId, share_id: &ShareId) -> Result<usize> {
        self.inner.delete_share(user_id, share_id).await
    }

    async fn set_pinned(&self, user_id: &UserId, item: &ItemIdentifier, pinned: bool) -> Result<()> {
        self.inner.set_pinned(user_id, item, pinned).await
    }
}

#[tokio::test]
async fn test_ten_pinned_items_replayed_to_late_subscriber() {
    let store = Arc::new(CountingStore::default());
    let harness = Harness::with_store(100, store.clone());
    let device_key = harness.device_keys.get_or_create().unwrap();
    let vault_key = VaultKey::generate(0);
    let share_id = share("s1");

    let mut records = Vec::new();
    for i in 0..13 {
        let name = format!("item-{i}");
        let mut revision = sealed_revision(&vault_key, &share_id, &name, 1, &note(&name, "x"));
        revision.pinned = i < 10;
        records.push(
            SymmetricallyEncryptedItem::seal(harness.user.clone(), revision, &note(&name, "x"), &device_key)
                .unwrap(),
        );
    }
    store.upsert(records).await.unwrap();

    let pinned = harness.repository.get_all_pinned_items(&harness.user).await.unwrap();
    assert_eq!(pinned.len(), 10);
    assert_eq!(store.pinned_queries.load(Ordering::SeqCst), 1);

    let mut subscription = harness.repository.subscribe_pinned(&harness.user);
    let replayed = subscription.next().await.unwrap();
    assert_eq!(replayed.len(), 10);
    assert_eq!(replayed.as_slice(), pinned.as_slice());
    assert_eq!(store.pinned_queries.load(Ordering::SeqCst), 1);

    // Insertion order is preserved.
    let names: Vec<String> = replayed.iter().map(|r| r.item_id.to_string()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("item-{i}")).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_pin_changes_are_published_in_order() {
    let harness = Harness::new();
    let vault_key = VaultKey::generate(0);
    let share_id = share("s1");
    harness.key_service.add_share(&share_id, vec![vault_key.clone()]);
    for name in ["a", "b"] {
        harness
            .item_service
            .put(sealed_revision(&vault_key, &share_id, name, 1, &note(name, "")));
    }
    harness.repository.sync_revisions(&harness.user, &share_id).await.unwrap();

    let mut subscription = harness.repository.subscribe_pinned(&harness.user);
    assert!(subscription.try_next().is_none());

    let a = ItemIdentifier::new(share_id.clone(), item_id("a"));
    let b = ItemIdentifier::new(share_id.clone(), item_id("b"));
    harness.repository.pin_item(&harness.user, &a, true).await.unwrap();
    harness.repository.pin_item(&harness.user, &b, true).await.unwrap();
    harness.repository.pin_item(&harness.user, &a, false).await.unwrap();

    let lengths = [
        subscription.next().await.unwrap().len(),
        subscription.next().await.unwrap().len(),
        subscription.next().await.unwrap().len(),
    ];
    assert_eq!(lengths, [1, 2, 1]);

    let last = harness.repository.get_all_pinned_items(&harness.user).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].item_id, item_id("b"));
    assert!(last[0].is_pinned);
}

#[tokio::test]
async fn test_sync_of_pinned_revision_publishes() {
    let harness = Harness::new();
    let vault_key = VaultKey::generate(0);
    let share_id = share("s1");
    harness.key_service.add_share(&share_id, vec![vault_key.clone()]);

    let mut revision = sealed_revision(&vault_key, &share_id, "pinned", 1, &note("p", ""));
    revision.pinned = true;
    harness.item_service.put(revision);

    let mut subscription = harness.repository.subscribe_pinned(&harness.user);
    harness.repository.sync_revisions(&harness.user, &share_id).await.unwrap();

    assert_eq!(subscription.next().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_removing_share_publishes_remaining_pins() {
    let harness = Harness::new();
    let vault_key = VaultKey::generate(0);
    let share_id = share("s1");
    harness.key_service.add_share(&share_id, vec![vault_key.clone()]);

    let mut revision = sealed_revision(&vault_key, &share_id, "pinned", 1, &note("p", ""));
    revision.pinned = true;
    harness.item_service.put(revision);
    harness.repository.sync_revisions(&harness.user, &share_id).await.unwrap();

    let removed = harness.repository.remove_share(&harness.user, &share_id).await.unwrap();
    assert_eq!(removed, 1);

    let mut subscription = harness.repository.subscribe_pinned(&harness.user);
    assert!(subscription.next().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pinned_feeds_are_per_user() {
    let harness = Harness::new();
    let device_key = harness.device_keys.get_or_create().unwrap();
    let vault_key = VaultKey::generate(0);
    let share_id = share("s1");
    let other = UserId::new("u2").unwrap();

    let mut revision = sealed_revision(&vault_key, &share_id, "theirs", 1, &note("theirs", ""));
    revision.pinned = true;
    let record =
        SymmetricallyEncryptedItem::seal(other.clone(), revision, &note("theirs", ""), &device_key)
            .unwrap();
    harness.store.upsert(vec![record]).await.unwrap();

    let mut mine = harness.repository.subscribe_pinned(&harness.user);
    let mut theirs = harness.repository.subscribe_pinned(&other);

    let published = harness.repository.get_all_pinned_items(&other).await.unwrap();
    assert_eq!(published.len(), 1);

    assert_eq!(theirs.next().await.unwrap().len(), 1);
    assert!(mine.try_next().is_none());

    harness.repository.get_all_pinned_items(&harness.user).await.unwrap();
    assert!(mine.next().await.unwrap().is_empty());
    assert!(theirs.try_next().is_none());
}
