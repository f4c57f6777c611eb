//! Encrypted request payloads for the item service.
//!
//! Content is sealed under an item key; the item key is wrapped under the
//! target vault key. Plaintext buffers are zeroized once sealed.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use passcore_common::{ItemContent, KeyRotation, Result, ShareId, CONTENT_FORMAT_VERSION};
use passcore_crypto::{
    open_base64, seal_base64, wrap_item_key, EncryptionContext, ItemKey, VaultKey,
};

/// Item content and key ready for submission to a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedItemPayload {
    /// Rotation of the vault key wrapping `item_key`.
    pub key_rotation: KeyRotation,
    pub content_format_version: u32,
    /// Base64 content sealed under the item key.
    pub content: String,
    /// Base64 item key sealed under the vault key.
    pub item_key: String,
}

/// New content for an existing item under its existing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub key_rotation: KeyRotation,
    /// Revision the update was based on.
    pub last_revision: u64,
    pub content_format_version: u32,
    pub content: String,
}

/// Batch move to another vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveItemsRequest {
    pub destination_share_id: ShareId,
    pub items: Vec<EncryptedItemPayload>,
}

/// Seal content under a fresh item key wrapped by `vault_key`.
pub fn seal_with_fresh_key(
    vault_key: &VaultKey,
    plaintext: &[u8],
    content_format_version: u32,
) -> Result<EncryptedItemPayload> {
    let item_key = ItemKey::generate();
    Ok(EncryptedItemPayload {
        key_rotation: vault_key.rotation(),
        content_format_version,
        content: seal_base64(&item_key, plaintext, EncryptionContext::ItemContent)?,
        item_key: wrap_item_key(vault_key, &item_key)?,
    })
}

/// Payload for a new item.
pub fn encrypt_new_item(vault_key: &VaultKey, content: &ItemContent) -> Result<EncryptedItemPayload> {
    let mut bytes = content.to_bytes()?;
    let payload = seal_with_fresh_key(vault_key, &bytes, CONTENT_FORMAT_VERSION);
    bytes.zeroize();
    payload
}

/// Payload updating an item whose key is `item_key` at `key_rotation`.
pub fn encrypt_update(
    item_key: &ItemKey,
    key_rotation: KeyRotation,
    last_revision: u64,
    content: &ItemContent,
) -> Result<UpdateItemRequest> {
    let mut bytes = content.to_bytes()?;
    let sealed = seal_base64(item_key, &bytes, EncryptionContext::ItemContent);
    bytes.zeroize();

    Ok(UpdateItemRequest {
        key_rotation,
        last_revision,
        content_format_version: CONTENT_FORMAT_VERSION,
        content: sealed?,
    })
}

/// Decrypt remote item content sealed under `item_key`.
pub fn decrypt_item_content(item_key: &ItemKey, encrypted_content: &str) -> Result<ItemContent> {
    let mut bytes = open_base64(item_key, encrypted_content, EncryptionContext::ItemContent)?;
    let content = ItemContent::from_bytes(&bytes);
    bytes.zeroize();
    content
}

/// Raw plaintext bytes of remote item content, for resealing without a
/// parse round trip.
pub fn open_item_bytes(item_key: &ItemKey, encrypted_content: &str) -> Result<Vec<u8>> {
    open_base64(item_key, encrypted_content, EncryptionContext::ItemContent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use passcore_common::{Error, ItemContentData};
    use passcore_crypto::unwrap_item_key;

    fn login() -> ItemContent {
        ItemContent {
            name: "mail".to_string(),
            note: String::new(),
            item_uuid: "u-1".to_string(),
            data: ItemContentData::Login {
                username: "ada".to_string(),
                password: "hunter2".to_string(),
                urls: vec!["https://mail.example".to_string()],
                totp_uri: String::new(),
            },
            extra_fields: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_new_item_opens_with_vault_key() {
        let vault_key = VaultKey::generate(3);
        let payload = encrypt_new_item(&vault_key, &login()).unwrap();

        assert_eq!(payload.key_rotation, 3);
        assert_eq!(payload.content_format_version, CONTENT_FORMAT_VERSION);

        let item_key = unwrap_item_key(&vault_key, &payload.item_key).unwrap();
        assert_eq!(decrypt_item_content(&item_key, &payload.content).unwrap(), login());
    }

    #[test]
    fn test_each_payload_gets_a_fresh_key() {
        let vault_key = VaultKey::generate(0);
        let a = encrypt_new_item(&vault_key, &login()).unwrap();
        let b = encrypt_new_item(&vault_key, &login()).unwrap();

        let key_a = unwrap_item_key(&vault_key, &a.item_key).unwrap();
        let key_b = unwrap_item_key(&vault_key, &b.item_key).unwrap();
        assert_ne!(key_a, key_b);
        assert!(matches!(
            decrypt_item_content(&key_a, &b.content),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_update_keeps_key_and_rotation() {
        let item_key = ItemKey::generate();
        let request = encrypt_update(&item_key, 2, 9, &login()).unwrap();

        assert_eq!(request.key_rotation, 2);
        assert_eq!(request.last_revision, 9);
        assert_eq!(decrypt_item_content(&item_key, &request.content).unwrap(), login());
    }

    #[test]
    fn test_move_request_wire_format() {
        let request = MoveItemsRequest {
            destination_share_id: ShareId::new("dest").unwrap(),
            items: vec![EncryptedItemPayload {
                key_rotation: 1,
                content_format_version: 1,
                content: "c".to_string(),
                item_key: "k".to_string(),
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["destinationShareId"], "dest");
        assert_eq!(json["items"][0]["keyRotation"], 1);
        assert_eq!(json["items"][0]["contentFormatVersion"], 1);
        assert_eq!(json["items"][0]["itemKey"], "k");
    }
}
