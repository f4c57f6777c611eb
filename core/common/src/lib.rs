//! Common utilities and types shared across the passcore crates.
//!
//! This module provides the error taxonomy, identifiers and the data model
//! exchanged between the key manager, the local cache and the item repository.

pub mod config;
pub mod error;
pub mod model;
pub mod types;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use model::{
    AttachmentManifest, CustomField, ItemContent, ItemContentData, ItemRevision, ShareRevision,
    ShareRole, VaultContent, CONTENT_FORMAT_VERSION,
};
pub use types::{
    ItemFlags, ItemId, ItemIdentifier, KeyRotation, ShareId, UserId, DEFAULT_PAGE_SIZE,
};
