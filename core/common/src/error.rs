//! Common error types for passcore.

use thiserror::Error;

use crate::types::{ItemId, KeyRotation, ShareId};

/// Top-level error type for passcore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// AEAD tag verification failed. The ciphertext is untrusted.
    #[error("Authentication failure: ciphertext could not be verified")]
    AuthenticationFailure,

    /// Vault and item key sets are out of sync for a share.
    #[error("Corrupted share keys for share {0}")]
    CorruptedShareKeys(ShareId),

    /// A historical vault key generation is neither cached nor available remotely.
    #[error("Key rotation {rotation} unresolvable for share {share_id}")]
    KeyRotationUnresolvable {
        share_id: ShareId,
        rotation: KeyRotation,
    },

    /// An item has no wrapped key in its revision or in the key service.
    #[error("No item key available for item {item_id} in share {share_id}")]
    ItemKeyUnavailable { share_id: ShareId, item_id: ItemId },

    /// Cipher-layer failure while sealing.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Cipher-layer failure while opening (e.g. malformed ciphertext).
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Remote collaborator failed. Transient; callers decide on retries.
    #[error("Network error: {0}")]
    Network(String),

    /// Local store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error invalidates every operation on its share.
    pub fn is_share_fatal(&self) -> bool {
        matches!(self, Error::CorruptedShareKeys(_))
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
