//! Local persistence for passcore.
//!
//! This module provides:
//! - `LocalItemStore`: the at-rest item cache interface, with in-memory and
//!   SQLite implementations
//! - `SymmetricallyEncryptedItem`: the cached record, content sealed under
//!   the device root key
//! - `SecureKeyStorage` and `DeviceKeyProvider`: custody of the device key
//!
//! # Design Principles
//! - The store never sees plaintext; it persists what it is given
//! - Reads return device-key ciphertext; callers decrypt on demand
//! - Implementations serialize their own writes

pub mod device_key;
pub mod item;
pub mod memory;
pub mod secure;
pub mod sqlite;
pub mod store;

pub use device_key::DeviceKeyProvider;
pub use item::SymmetricallyEncryptedItem;
pub use memory::MemoryItemStore;
pub use secure::{FileKeyStorage, MemoryKeyStorage, SecureKeyStorage};
pub use sqlite::SqliteItemStore;
pub use store::LocalItemStore;
