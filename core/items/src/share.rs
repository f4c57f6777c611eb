//! Vault metadata encryption.

use zeroize::Zeroize;

use passcore_common::{Result, ShareRevision, VaultContent};
use passcore_crypto::{open_base64, seal_base64, EncryptionContext, VaultKey};
use passcore_keys::PassKeyManager;

/// Decrypt a share's name and description.
///
/// Uses the vault key at `content_key_rotation`, or the active key when the
/// revision does not say. Shares without content yield `None`.
pub async fn decrypt_share_content(
    keys: &PassKeyManager,
    share: &ShareRevision,
) -> Result<Option<VaultContent>> {
    let Some(content) = &share.content else {
        return Ok(None);
    };

    let vault_key = match share.content_key_rotation {
        Some(rotation) => keys.vault_key(&share.share_id, rotation).await?,
        None => keys.active_vault_key(&share.share_id).await?,
    };

    let mut bytes = open_base64(&vault_key, content, EncryptionContext::VaultContent)?;
    let decoded = VaultContent::from_bytes(&bytes);
    bytes.zeroize();
    decoded.map(Some)
}

/// Seal vault metadata under a vault key.
pub fn encrypt_share_content(vault_key: &VaultKey, content: &VaultContent) -> Result<String> {
    let mut bytes = content.to_bytes()?;
    let sealed = seal_base64(vault_key, &bytes, EncryptionContext::VaultContent);
    bytes.zeroize();
    sealed
}
