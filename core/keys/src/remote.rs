//! Remote key service interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use passcore_common::{ItemId, KeyRotation, Result, ShareId};

/// One vault key generation as delivered by the key service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareKeyRecord {
    pub key_rotation: KeyRotation,
    /// Base64 key material sealed under the user key.
    pub key: String,
    #[serde(default)]
    pub create_time: i64,
}

/// Wrapped key of one item at one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKeyRecord {
    pub item_id: ItemId,
    pub key_rotation: KeyRotation,
    /// Base64 item key sealed under the vault key of `key_rotation`.
    pub key: String,
}

/// One page of `GET shares/{shareId}/keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareKeysPage {
    #[serde(default)]
    pub vault_keys: Vec<ShareKeyRecord>,
    #[serde(default)]
    pub item_keys: Vec<ItemKeyRecord>,
    /// Server-reported size of this page.
    pub total: usize,
}

/// All key records of a share, concatenated across pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareKeys {
    pub vault_keys: Vec<ShareKeyRecord>,
    pub item_keys: Vec<ItemKeyRecord>,
}

/// Remote key service.
#[async_trait]
pub trait RemoteShareKeyDatasource: Send + Sync {
    /// Fetch one page of key records for a share.
    ///
    /// # Errors
    /// - `Error::Network` on transport failure
    async fn get_share_keys(
        &self,
        share_id: &ShareId,
        page: usize,
        page_size: usize,
    ) -> Result<ShareKeysPage>;
}

/// Fetch every key page of a share.
///
/// Pages are requested strictly one after another. A page whose reported
/// `total` equals `page_size` means more may follow; the first short page
/// ends the loop. Failures are returned as-is, without retrying.
pub async fn fetch_all_share_keys<R: RemoteShareKeyDatasource + ?Sized>(
    remote: &R,
    share_id: &ShareId,
    page_size: usize,
) -> Result<ShareKeys> {
    let mut keys = ShareKeys::default();
    let mut page = 0;

    loop {
        let response = remote.get_share_keys(share_id, page, page_size).await?;
        debug!(
            share_id = %share_id,
            page,
            vault_keys = response.vault_keys.len(),
            item_keys = response.item_keys.len(),
            total = response.total,
            "Fetched share key page"
        );

        keys.vault_keys.extend(response.vault_keys);
        keys.item_keys.extend(response.item_keys);

        if response.total != page_size {
            break;
        }
        page += 1;
    }

    Ok(keys)
}
