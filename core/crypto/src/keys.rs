//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory. Distinct wrapper types keep a
//! device key from being passed where a vault key is expected.

use chacha20poly1305::{
    aead::{KeyInit, OsRng},
    ChaCha20Poly1305,
};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use passcore_common::{Error, KeyRotation, Result};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Anything that can key the content cipher.
pub trait AeadKey {
    /// Raw key bytes. Use immediately, never store.
    fn key_bytes(&self) -> &[u8; KEY_LENGTH];
}

/// Raw 256-bit symmetric key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_LENGTH],
}

impl SymmetricKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a key from a slice, e.g. freshly unwrapped key material.
    ///
    /// # Errors
    /// - Returns `Error::Decryption` if the slice is not KEY_LENGTH bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(Error::Decryption(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Generate a random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let generated = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(generated.as_slice());
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl AeadKey for SymmetricKey {
    fn key_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.key[..].ct_eq(&other.key[..]).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// One generation of a vault's key.
///
/// Owned by the vault; the client only caches it read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey {
    rotation: KeyRotation,
    key: SymmetricKey,
}

impl VaultKey {
    pub fn new(rotation: KeyRotation, key: SymmetricKey) -> Self {
        Self { rotation, key }
    }

    /// Generate a fresh vault key for the given rotation.
    pub fn generate(rotation: KeyRotation) -> Self {
        Self::new(rotation, SymmetricKey::generate())
    }

    /// Generation this key belongs to.
    pub fn rotation(&self) -> KeyRotation {
        self.rotation
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }
}

impl AeadKey for VaultKey {
    fn key_bytes(&self) -> &[u8; KEY_LENGTH] {
        self.key.as_bytes()
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKey(rotation={}, [REDACTED])", self.rotation)
    }
}

macro_rules! typed_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(SymmetricKey);

        impl $name {
            /// Create from raw bytes.
            pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
                Self(SymmetricKey::from_bytes(key))
            }

            /// Create from a slice of exactly KEY_LENGTH bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                SymmetricKey::from_slice(bytes).map(Self)
            }

            /// Generate a random key.
            pub fn generate() -> Self {
                Self(SymmetricKey::generate())
            }

            /// Get the key bytes.
            pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
                self.0.as_bytes()
            }

            pub fn key(&self) -> &SymmetricKey {
                &self.0
            }
        }

        impl From<SymmetricKey> for $name {
            fn from(key: SymmetricKey) -> Self {
                Self(key)
            }
        }

        impl AeadKey for $name {
            fn key_bytes(&self) -> &[u8; KEY_LENGTH] {
                self.0.as_bytes()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "([REDACTED])"))
            }
        }
    };
}

typed_key!(
    /// Per-item key protecting exactly one item's content.
    ItemKey
);
typed_key!(
    /// Session-scoped key protecting the local at-rest cache. Never transmitted.
    DeviceKey
);
typed_key!(
    /// Account key that wraps vault keys delivered by the key service.
    UserKey
);
