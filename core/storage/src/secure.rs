//! Secure key storage abstraction (keychain-equivalent).
//!
//! Only the device root key goes through here; vault and item keys are
//! never persisted in plaintext.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use zeroize::Zeroizing;

use passcore_common::{Error, Result};

/// Key-value storage for secret material.
pub trait SecureKeyStorage: Send + Sync {
    /// Read a value, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value, replacing any previous one.
    fn set(&self, value: &[u8], key: &str) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory secure storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyStorage {
    values: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::Storage("Key storage lock poisoned".to_string())
}

impl SecureKeyStorage for MemoryKeyStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self.values.read().map_err(|_| poisoned())?;
        Ok(values.get(key).map(|v| v.to_vec()))
    }

    fn set(&self, value: &[u8], key: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.insert(key.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

/// File-backed secure storage: one owner-only file per key in a directory.
pub struct FileKeyStorage {
    root: PathBuf,
}

impl FileKeyStorage {
    /// Use `root` as storage directory, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid key name: {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

impl SecureKeyStorage for FileKeyStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a sibling temp file, then renames it over the key's file, so a
    /// reader sees either the old value or the new one.
    fn set(&self, value: &[u8], key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Key names never start with '.', so this cannot be another key's file.
        let staging = self.root.join(format!(".{key}.tmp"));

        let written = write_owner_only(&staging, value).and_then(|()| fs::rename(&staging, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_owner_only(path: &Path, value: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // The creation mode is ignored for a file that already exists.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(value)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &dyn SecureKeyStorage) {
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set(b"first", "k").unwrap();
        storage.set(b"second", "k").unwrap();
        assert_eq!(storage.get("k").unwrap(), Some(b"second".to_vec()));

        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage() {
        exercise(&MemoryKeyStorage::new());
    }

    #[test]
    fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileKeyStorage::new(dir.path().join("keys")).unwrap());
    }

    #[test]
    fn test_file_storage_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path()).unwrap();

        assert!(matches!(storage.get("../escape"), Err(Error::InvalidInput(_))));
        assert!(matches!(storage.set(b"x", ""), Err(Error::InvalidInput(_))));
        assert!(matches!(storage.set(b"x", ".hidden"), Err(Error::InvalidInput(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FileKeyStorage::new(dir.path()).unwrap();
        storage.set(b"secret", "device").unwrap();

        let mode = fs::metadata(dir.path().join("device")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let storage = FileKeyStorage::new(dir.path()).unwrap();
        storage.set(b"new", "device").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(storage.get("device").unwrap(), Some(b"new".to_vec()));
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("device")]);
    }
}
