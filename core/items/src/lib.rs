//! Item repository for passcore.
//!
//! This module provides:
//! - `ItemRepository`: merges remote revisions into the local cache, moves
//!   items between vaults, and publishes the live pinned-items feed
//! - The remote item service interface and its request payloads
//! - Per-share sync phase tracking and sync reports
//!
//! # Data flow
//! Remote revision → key manager (item key) → content cipher → device-key
//! reseal → local store → pinned feed subscribers.

pub mod feed;
mod lock;
pub mod payload;
pub mod remote;
pub mod repository;
pub mod share;
pub mod state;

pub use feed::{PinnedItems, PinnedItemsFeed, PinnedItemsSubscription};
pub use payload::{EncryptedItemPayload, MoveItemsRequest, UpdateItemRequest};
pub use remote::{ItemRevisionsPage, RemoteItemDatasource};
pub use repository::ItemRepository;
pub use share::{decrypt_share_content, encrypt_share_content};
pub use state::{SyncPhase, SyncReport};
