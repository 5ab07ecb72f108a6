//! Credential storage
//!
//! The access and refresh credentials live behind the `CredentialStore`
//! capability so the client never touches process-global storage directly.
//! Reads and writes are synchronous and last-writer-wins. Locks are held only
//! for the duration of a single map operation, never across an await point.
//!
//! Two backings are provided: `MemoryStore` for tests and short-lived
//! processes, and `FileStore`, which persists the pair as a JSON object
//! using atomic temp-file + rename writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use common::Secret;
use tracing::{debug, info};

use crate::endpoints::{ACCESS_KEY, REFRESH_KEY};
use crate::error::{Error, Result};

/// The two persisted credential slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Access,
    Refresh,
}

impl CredentialKey {
    /// Key under which the credential is persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::Access => ACCESS_KEY,
            CredentialKey::Refresh => REFRESH_KEY,
        }
    }
}

/// Synchronous key-value storage for the session credentials.
///
/// Both slots empty means an unauthenticated session.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Option<Secret<String>>;

    fn set(&self, key: CredentialKey, value: &str) -> Result<()>;

    fn remove(&self, key: CredentialKey) -> Result<()>;

    /// Remove both credentials. Succeeds when the store is already empty.
    fn clear(&self) -> Result<()> {
        self.remove(CredentialKey::Access)?;
        self.remove(CredentialKey::Refresh)
    }

    /// Persist a freshly issued pair. A missing refresh credential keeps the
    /// one already stored.
    fn store_pair(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        self.set(CredentialKey::Access, access)?;
        if let Some(refresh) = refresh {
            self.set(CredentialKey::Refresh, refresh)?;
        }
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.get(CredentialKey::Access).is_some() || self.get(CredentialKey::Refresh).is_some()
    }
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<HashMap<CredentialKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a credential pair.
    pub fn with_pair(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().unwrap_or_else(PoisonError::into_inner);
            state.insert(CredentialKey::Access, access.to_owned());
            state.insert(CredentialKey::Refresh, refresh.to_owned());
        }
        store
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: CredentialKey) -> Option<Secret<String>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.get(&key).cloned().map(Secret::new)
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.insert(key, value.to_owned());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.remove(&key);
        Ok(())
    }
}

/// Credential store persisted to a JSON file.
///
/// The file holds a flat object keyed by `CredentialKey::as_str()`. Every
/// mutation rewrites it atomically with 0600 permissions.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Load credentials from `path`.
    ///
    /// A missing file is a cold start: it is created as `{}` along with any
    /// missing parent directories.
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credentials: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), entries = credentials.len(), "loaded credentials");
            credentials
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;
            }
            let empty = HashMap::new();
            write_atomic(&path, &empty)?;
            empty
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: CredentialKey) -> Option<Secret<String>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.get(key.as_str()).cloned().map(Secret::new)
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.insert(key.as_str().to_owned(), value.to_owned());
        debug!(key = key.as_str(), "stored credential");
        write_atomic(&self.path, &state)
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.remove(key.as_str()).is_some() {
            debug!(key = key.as_str(), "removed credential");
            write_atomic(&self.path, &state)?;
        }
        Ok(())
    }

    /// Both credentials land in one rewrite, so the file never pairs a new
    /// access credential with a stale refresh credential.
    fn store_pair(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.insert(CredentialKey::Access.as_str().to_owned(), access.to_owned());
        if let Some(refresh) = refresh {
            state.insert(CredentialKey::Refresh.as_str().to_owned(), refresh.to_owned());
        }
        debug!(rotated_refresh = refresh.is_some(), "stored credential pair");
        write_atomic(&self.path, &state)
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.is_empty() {
            return Ok(());
        }
        state.clear();
        debug!("cleared credentials");
        write_atomic(&self.path, &state)
    }
}

/// Write the credential map atomically: temp file in the same directory,
/// then rename over the target.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
