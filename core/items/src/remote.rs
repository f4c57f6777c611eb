//! Remote item service interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use passcore_common::{ItemId, ItemRevision, Result, ShareId};

use crate::payload::{EncryptedItemPayload, MoveItemsRequest, UpdateItemRequest};

/// One page of item revisions of a share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRevisionsPage {
    #[serde(default)]
    pub revisions: Vec<ItemRevision>,
    /// Server-reported size of this page.
    pub total: usize,
}

/// Remote item service.
///
/// All calls fail with `Error::Network` on transport failure. None of them
/// are retried by the repository.
#[async_trait]
pub trait RemoteItemDatasource: Send + Sync {
    /// Fetch one page of revisions for a share.
    async fn get_item_revisions(
        &self,
        share_id: &ShareId,
        page: usize,
        page_size: usize,
    ) -> Result<ItemRevisionsPage>;

    /// Create an item in a share.
    async fn create_item(
        &self,
        share_id: &ShareId,
        request: EncryptedItemPayload,
    ) -> Result<ItemRevision>;

    /// Replace an item's content. Rejected if `last_revision` is stale.
    async fn update_item(
        &self,
        share_id: &ShareId,
        item_id: &ItemId,
        request: UpdateItemRequest,
    ) -> Result<ItemRevision>;

    /// Move items out of `share_id`, committing the batch atomically.
    ///
    /// # Returns
    /// The new revisions in the destination share, in request order.
    async fn move_items(
        &self,
        share_id: &ShareId,
        request: MoveItemsRequest,
    ) -> Result<Vec<ItemRevision>>;

    /// Pin or unpin an item.
    async fn set_item_pinned(
        &self,
        share_id: &ShareId,
        item_id: &ItemId,
        pinned: bool,
    ) -> Result<ItemRevision>;
}
