//! Authenticated encryption using ChaCha20-Poly1305.
//!
//! Every call draws a fresh 96-bit nonce from the OS CSPRNG. The associated
//! data is a fixed tag naming the use site, so a ciphertext produced for one
//! purpose fails authentication when presented for another.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::keys::AeadKey;
use passcore_common::{Error, Result};

/// Nonce size for ChaCha20-Poly1305 (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Associated-data tag distinguishing the places ciphertext is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionContext {
    /// Vault key wrapped under the user key.
    VaultKeyWrap,
    /// Item key wrapped under a vault key.
    ItemKeyWrap,
    /// Item content, under an item key or the device key.
    ItemContent,
    /// Vault name and description under a vault key.
    VaultContent,
}

impl EncryptionContext {
    /// Associated data bound into the authentication tag.
    pub fn tag(&self) -> &'static [u8] {
        match self {
            EncryptionContext::VaultKeyWrap => b"vaultkey",
            EncryptionContext::ItemKeyWrap => b"itemkey",
            EncryptionContext::ItemContent => b"itemcontent",
            EncryptionContext::VaultContent => b"vaultcontent",
        }
    }
}

/// Seal plaintext under `key` for the given context.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The ciphertext length is plaintext length + NONCE_SIZE + TAG_SIZE
///
/// # Errors
/// - Returns `Error::Encryption` if the cipher rejects the input
pub fn seal<K: AeadKey + ?Sized>(
    key: &K,
    plaintext: &[u8],
    context: EncryptionContext,
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.key_bytes()));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: context.tag(),
            },
        )
        .map_err(|e| Error::Encryption(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Open a ciphertext produced by [`seal`] with the same key and context.
///
/// # Errors
/// - `Error::Decryption` if the input is shorter than NONCE_SIZE + TAG_SIZE
/// - `Error::AuthenticationFailure` if the tag does not verify; no plaintext
///   is returned in that case
pub fn open<K: AeadKey + ?Sized>(
    key: &K,
    ciphertext: &[u8],
    context: EncryptionContext,
) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Decryption(format!(
            "Ciphertext too short: {} bytes",
            ciphertext.len()
        )));
    }

    let (nonce_bytes, encrypted) = ciphertext.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.key_bytes()));

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: encrypted,
                aad: context.tag(),
            },
        )
        .map_err(|_| Error::AuthenticationFailure)
}
