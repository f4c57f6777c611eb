//! Data model shared by the remote collaborators, the key manager and the
//! local cache.
//!
//! Remote records carry base64 ciphertext exactly as received on the wire.
//! Plaintext types (`ItemContent`, `VaultContent`) never leave process memory
//! unencrypted and are zeroized on drop.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::types::{ItemFlags, ItemId, KeyRotation, ShareId};

/// Format version written into every item content submitted to the server.
pub const CONTENT_FORMAT_VERSION: u32 = 1;

/// Remote representation of one item revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRevision {
    pub item_id: ItemId,
    pub share_id: ShareId,
    /// Monotonically increasing revision number, used for last-write-wins.
    pub revision: u64,
    pub content_format_version: u32,
    /// Rotation of the vault key that wrapped `encrypted_item_key`.
    pub key_rotation: KeyRotation,
    /// Base64 content sealed under the item key.
    pub encrypted_content: String,
    /// Base64 item key sealed under the vault key. Absent on revisions whose
    /// key must be looked up through the key service.
    #[serde(default)]
    pub encrypted_item_key: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub flags: ItemFlags,
    #[serde(default)]
    pub last_use_time: Option<i64>,
    #[serde(default)]
    pub modify_time: i64,
}

/// A user-defined extra field on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub hidden: bool,
}

/// Manifest entry for a file attached to an item. The file body lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentManifest {
    pub file_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Type-specific part of an item's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemContentData {
    #[serde(rename_all = "camelCase")]
    Login {
        username: String,
        password: String,
        #[serde(default)]
        urls: Vec<String>,
        #[serde(default)]
        totp_uri: String,
    },
    Note,
    Alias,
    #[serde(rename_all = "camelCase")]
    CreditCard {
        cardholder_name: String,
        number: String,
        expiration_date: String,
        verification_number: String,
        #[serde(default)]
        pin: String,
    },
}

/// Plaintext content of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct ItemContent {
    pub name: String,
    #[serde(default)]
    pub note: String,
    pub item_uuid: String,
    pub data: ItemContentData,
    #[serde(default)]
    pub extra_fields: Vec<CustomField>,
    #[serde(default)]
    pub attachments: Vec<AttachmentManifest>,
}

impl ItemContent {
    /// Serialize to bytes for sealing.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from opened bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Membership level of the current user in a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Admin,
    Write,
    Read,
}

impl ShareRole {
    /// Whether items in the share may be created, updated or moved.
    pub fn can_write(&self) -> bool {
        matches!(self, ShareRole::Admin | ShareRole::Write)
    }
}

/// Remote representation of a vault the user is a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRevision {
    pub share_id: ShareId,
    pub vault_id: String,
    pub role: ShareRole,
    #[serde(default)]
    pub owner: bool,
    /// Base64 vault content sealed under the vault key at `content_key_rotation`.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_key_rotation: Option<KeyRotation>,
    #[serde(default)]
    pub content_format_version: Option<u32>,
}

/// Plaintext vault metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct VaultContent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl VaultContent {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}
