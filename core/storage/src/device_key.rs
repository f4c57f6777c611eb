//! Device root key custody.

use std::sync::{Arc, Mutex};
use tracing::info;
use zeroize::Zeroize;

use passcore_common::{Error, Result};
use passcore_crypto::DeviceKey;

use crate::secure::SecureKeyStorage;

/// Supplies the device root key protecting the local cache.
///
/// The key is loaded from secure storage on first use, or generated and
/// stored if none exists, then kept in memory for the session.
pub struct DeviceKeyProvider {
    storage: Arc<dyn SecureKeyStorage>,
    key_name: String,
    cached: Mutex<Option<DeviceKey>>,
}

impl DeviceKeyProvider {
    pub fn new(storage: Arc<dyn SecureKeyStorage>, key_name: impl Into<String>) -> Self {
        Self {
            storage,
            key_name: key_name.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return the device key, creating and persisting it if absent.
    pub fn get_or_create(&self) -> Result<DeviceKey> {
        let mut cached = self.lock()?;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let key = match self.load()? {
            Some(key) => key,
            None => {
                let key = DeviceKey::generate();
                self.storage.set(key.as_bytes(), &self.key_name)?;
                info!(key_name = %self.key_name, "Generated new device key");
                key
            }
        };

        *cached = Some(key.clone());
        Ok(key)
    }

    /// Return the device key only if one already exists.
    pub fn get(&self) -> Result<Option<DeviceKey>> {
        let mut cached = self.lock()?;
        if cached.is_none() {
            *cached = self.load()?;
        }
        Ok(cached.clone())
    }

    /// Forget the device key in memory and in secure storage (session end).
    ///
    /// Anything sealed under it becomes unreadable.
    pub fn clear(&self) -> Result<()> {
        let mut cached = self.lock()?;
        *cached = None;
        self.storage.remove(&self.key_name)?;
        info!(key_name = %self.key_name, "Cleared device key");
        Ok(())
    }

    fn load(&self) -> Result<Option<DeviceKey>> {
        match self.storage.get(&self.key_name)? {
            Some(mut bytes) => {
                let key = DeviceKey::from_slice(&bytes);
                bytes.zeroize();
                key.map(Some).map_err(|_| {
                    Error::Storage(format!(
                        "Stored device key {} has an invalid length",
                        self.key_name
                    ))
                })
            }
            None => Ok(None),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<DeviceKey>>> {
        self.cached
            .lock()
            .map_err(|_| Error::Storage("Device key lock poisoned".to_string()))
    }
}
