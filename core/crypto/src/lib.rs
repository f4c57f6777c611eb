//! Cryptographic primitives for passcore.
//!
//! This module provides:
//! - Authenticated encryption using ChaCha20-Poly1305 bound to a use-site context
//! - Typed vault, item, device and user keys with automatic zeroization
//! - Envelope helpers for wrapping keys and sealing base64 wire payloads
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Ciphertext sealed for one context never opens under another
//! - Key equality is compared in constant time

pub mod aead;
pub mod envelope;
pub mod keys;

pub use aead::{open, seal, EncryptionContext, NONCE_SIZE, TAG_SIZE};
pub use envelope::{
    decode, encode, open_base64, seal_base64, unwrap_item_key, unwrap_vault_key, wrap_item_key,
    wrap_vault_key,
};
pub use keys::{AeadKey, DeviceKey, ItemKey, SymmetricKey, UserKey, VaultKey, KEY_LENGTH};
