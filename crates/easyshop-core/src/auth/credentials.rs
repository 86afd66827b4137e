use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "easyshop";

/// Name of the single slot holding the bearer credential.
pub const TOKEN_SLOT: &str = "token";

/// Durable storage for the one bearer credential of this client.
///
/// Purely mechanical: nothing here validates the credential. A store that
/// cannot be read reports `None` so callers fall back to a logged-out state.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

fn non_empty(token: String) -> Option<String> {
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Credential kept in the OS keychain.
pub struct KeyringCredentialStore {
    slot: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_slot(TOKEN_SLOT)
    }

    pub fn with_slot(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.slot).context("Failed to create keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Option<String> {
        let entry = match self.entry() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Keyring unavailable, treating as logged out");
                return None;
            }
        };
        match entry.get_password() {
            Ok(token) => non_empty(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read credential from keychain");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store credential in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// Credential kept in a plain file inside the cache directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            path: cache_dir.join(TOKEN_SLOT),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        if !self.path.exists() {
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => non_empty(contents.trim().to_string()),
            Err(e) => {
                warn!(error = %e, path = ?self.path, "Failed to read credential file");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        write_private(&self.path, token).context("Failed to write credential file")?;
        debug!(path = ?self.path, "Credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

/// Write `contents`, readable by the owner only on unix.
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        // mode() only applies on creation
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    options.open(path)?.write_all(contents.as_bytes())
}

/// Process-local credential, lost on exit.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(non_empty(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        match self.token.lock() {
            Ok(token) => token.clone(),
            Err(_) => {
                warn!("Credential lock poisoned, treating as logged out");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential lock poisoned"))?;
        *slot = non_empty(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get(), None);

        store.set("abc.def.ghi").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc.def.ghi"));

        store.clear().unwrap();
        assert_eq!(store.get(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_memory_store_empty_is_absent() {
        let store = MemoryCredentialStore::with_token("");
        assert_eq!(store.get(), None);

        store.set("").unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested"));
        assert_eq!(store.get(), None);

        store.set("abc.def.ghi").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc.def.ghi"));

        // A second store over the same directory sees the persisted value
        let reopened = FileCredentialStore::new(dir.path().join("nested"));
        assert_eq!(reopened.get().as_deref(), Some("abc.def.ghi"));

        store.clear().unwrap();
        assert_eq!(reopened.get(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_empty_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_file_store_unreadable_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        // A directory in place of the file cannot be read as a string
        std::fs::create_dir_all(store.path()).unwrap();
        assert_eq!(store.get(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "old").unwrap();
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        store.set("abc.def.ghi").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get().as_deref(), Some("abc.def.ghi"));
    }
}
