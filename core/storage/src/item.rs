//! Locally cached item record.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use passcore_common::{
    ItemContent, ItemFlags, ItemId, ItemIdentifier, ItemRevision, Result, ShareId, UserId,
};
use passcore_crypto::{open_base64, seal_base64, DeviceKey, EncryptionContext};

/// An item as kept in the local cache.
///
/// `encrypted_content` is the plaintext content sealed under the device root
/// key, so reading it needs no vault key lookup. `item` keeps the remote
/// revision (still vault-key protected) for merges and moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetricallyEncryptedItem {
    pub user_id: UserId,
    pub share_id: ShareId,
    pub item_id: ItemId,
    pub item: ItemRevision,
    /// Base64 content sealed under the device key (context `item-content`).
    pub encrypted_content: String,
    pub is_pinned: bool,
    pub flags: ItemFlags,
    pub last_use_time: Option<i64>,
}

impl SymmetricallyEncryptedItem {
    /// Build a cache record from a decrypted revision.
    pub fn seal(
        user_id: UserId,
        item: ItemRevision,
        content: &ItemContent,
        device_key: &DeviceKey,
    ) -> Result<Self> {
        let mut bytes = content.to_bytes()?;
        let sealed = seal_base64(device_key, &bytes, EncryptionContext::ItemContent);
        bytes.zeroize();

        Ok(Self {
            user_id,
            share_id: item.share_id.clone(),
            item_id: item.item_id.clone(),
            is_pinned: item.pinned,
            flags: item.flags,
            last_use_time: item.last_use_time,
            encrypted_content: sealed?,
            item,
        })
    }

    /// Decrypt the cached content with the device key.
    pub fn decrypt_content(&self, device_key: &DeviceKey) -> Result<ItemContent> {
        let mut bytes = open_base64(
            device_key,
            &self.encrypted_content,
            EncryptionContext::ItemContent,
        )?;
        let content = ItemContent::from_bytes(&bytes);
        bytes.zeroize();
        content
    }

    /// Point this record at a new remote revision whose content is unchanged,
    /// e.g. after a move or a pin change. The device-key ciphertext is kept.
    pub fn with_revision(self, item: ItemRevision) -> Self {
        Self {
            share_id: item.share_id.clone(),
            item_id: item.item_id.clone(),
            is_pinned: item.pinned,
            flags: item.flags,
            last_use_time: item.last_use_time,
            item,
            ..self
        }
    }

    pub fn identifier(&self) -> ItemIdentifier {
        ItemIdentifier::new(self.share_id.clone(), self.item_id.clone())
    }
}
