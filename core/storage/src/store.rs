//! Local item store trait definition.

use async_trait::async_trait;

use passcore_common::{ItemId, ItemIdentifier, Result, ShareId, UserId};

use crate::item::SymmetricallyEncryptedItem;

/// Durable cache of items sealed under the device key.
///
/// Records are keyed by `(user_id, share_id, item_id)`. Collections are
/// returned in insertion order; replacing a record keeps its position.
#[async_trait]
pub trait LocalItemStore: Send + Sync {
    /// Get the store name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Insert or replace records.
    async fn upsert(&self, items: Vec<SymmetricallyEncryptedItem>) -> Result<()>;

    /// All records of a user.
    async fn get_all(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>>;

    /// Records of a user flagged as pinned.
    async fn get_all_pinned(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>>;

    /// One record, if cached.
    async fn get_item(
        &self,
        user_id: &UserId,
        share_id: &ShareId,
        item_id: &ItemId,
    ) -> Result<Option<SymmetricallyEncryptedItem>>;

    /// Delete records. Unknown identifiers are ignored.
    ///
    /// # Returns
    /// Number of records removed.
    async fn delete(&self, user_id: &UserId, items: &[ItemIdentifier]) -> Result<usize>;

    /// Delete every record of a share (vault removed).
    async fn delete_share(&self, user_id: &UserId, share_id: &ShareId) -> Result<usize>;

    /// Set the pinned flag of one record.
    ///
    /// # Errors
    /// - `NotFound` if the record is not cached
    async fn set_pinned(&self, user_id: &UserId, item: &ItemIdentifier, pinned: bool) -> Result<()>;
}
