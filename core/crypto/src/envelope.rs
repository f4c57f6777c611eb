//! Envelope helpers: wrapping keys under keys and moving sealed payloads
//! through base64 wire fields.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroize;

use crate::aead::{open, seal, EncryptionContext};
use crate::keys::{AeadKey, ItemKey, SymmetricKey, UserKey, VaultKey};
use passcore_common::{Error, KeyRotation, Result};

/// Encode bytes for a wire field.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 wire field.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| Error::Decryption(format!("Invalid base64: {}", e)))
}

/// Seal and base64-encode in one step.
pub fn seal_base64<K: AeadKey + ?Sized>(
    key: &K,
    plaintext: &[u8],
    context: EncryptionContext,
) -> Result<String> {
    seal(key, plaintext, context).map(|sealed| encode(&sealed))
}

/// Base64-decode and open in one step.
pub fn open_base64<K: AeadKey + ?Sized>(
    key: &K,
    encoded: &str,
    context: EncryptionContext,
) -> Result<Vec<u8>> {
    open(key, &decode(encoded)?, context)
}

fn unwrap_symmetric<K: AeadKey + ?Sized>(
    wrapping: &K,
    encoded: &str,
    context: EncryptionContext,
) -> Result<SymmetricKey> {
    let mut raw = open_base64(wrapping, encoded, context)?;
    let key = SymmetricKey::from_slice(&raw);
    raw.zeroize();
    key
}

/// Wrap an item key under a vault key (context `item-key-wrap`).
pub fn wrap_item_key(vault_key: &VaultKey, item_key: &ItemKey) -> Result<String> {
    seal_base64(vault_key, item_key.as_bytes(), EncryptionContext::ItemKeyWrap)
}

/// Unwrap an item key sealed by [`wrap_item_key`].
pub fn unwrap_item_key(vault_key: &VaultKey, encoded: &str) -> Result<ItemKey> {
    unwrap_symmetric(vault_key, encoded, EncryptionContext::ItemKeyWrap).map(ItemKey::from)
}

/// Wrap vault key material under the user key (context `vault-key-wrap`).
pub fn wrap_vault_key(user_key: &UserKey, vault_key: &VaultKey) -> Result<String> {
    seal_base64(
        user_key,
        vault_key.key().as_bytes(),
        EncryptionContext::VaultKeyWrap,
    )
}

/// Unwrap vault key material delivered by the key service.
pub fn unwrap_vault_key(
    user_key: &UserKey,
    rotation: KeyRotation,
    encoded: &str,
) -> Result<VaultKey> {
    unwrap_symmetric(user_key, encoded, EncryptionContext::VaultKeyWrap)
        .map(|key| VaultKey::new(rotation, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_wrap_roundtrip() {
        let vault_key = VaultKey::generate(1);
        let item_key = ItemKey::generate();

        let wrapped = wrap_item_key(&vault_key, &item_key).unwrap();
        let unwrapped = unwrap_item_key(&vault_key, &wrapped).unwrap();

        assert_eq!(unwrapped, item_key);
    }

    #[test]
    fn test_item_key_wrong_vault_key() {
        let item_key = ItemKey::generate();
        let wrapped = wrap_item_key(&VaultKey::generate(1), &item_key).unwrap();

        let result = unwrap_item_key(&VaultKey::generate(2), &wrapped);
        assert!(matches!(result, Err(Error::AuthenticationFailure)));
    }

    #[test]
    fn test_vault_key_unwrap_keeps_rotation() {
        let user_key = UserKey::generate();
        let vault_key = VaultKey::generate(4);

        let wrapped = wrap_vault_key(&user_key, &vault_key).unwrap();
        let unwrapped = unwrap_vault_key(&user_key, 4, &wrapped).unwrap();

        assert_eq!(unwrapped, vault_key);
    }

    #[test]
    fn test_wrapped_item_key_is_not_a_vault_key() {
        let vault_key = VaultKey::generate(1);
        let user_key = UserKey::from_bytes(*vault_key.key().as_bytes());
        let wrapped = wrap_item_key(&vault_key, &ItemKey::generate()).unwrap();

        // Same key bytes, different context.
        assert!(matches!(
            unwrap_vault_key(&user_key, 1, &wrapped),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrapped_payload_of_wrong_length() {
        let vault_key = VaultKey::generate(1);
        let wrapped = seal_base64(&vault_key, &[1u8; 10], EncryptionContext::ItemKeyWrap).unwrap();

        assert!(matches!(
            unwrap_item_key(&vault_key, &wrapped),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(decode("%%%"), Err(Error::Decryption(_))));
    }
}
