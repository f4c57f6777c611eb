//! Vault key hierarchy for passcore.
//!
//! This module provides:
//! - `KeyRing`: per-share ordered key generations and cached item key records
//! - `PassKeyManager`: resolves active and historical vault keys and item keys,
//!   fetching missing material from the remote key service
//! - The remote key service interface and its paginated fetch loop
//!
//! # Security
//! Resolved keys live in memory for the session only and are never persisted.

pub mod keyring;
pub mod manager;
pub mod remote;

pub use keyring::{KeyRing, ShareKeySet};
pub use manager::PassKeyManager;
pub use remote::{
    fetch_all_share_keys, ItemKeyRecord, RemoteShareKeyDatasource, ShareKeyRecord, ShareKeys,
    ShareKeysPage,
};
