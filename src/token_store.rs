//! Persistence of the single delegated credential record

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::auth::secure_token_file;
use crate::error::{Result, TriageError};
use crate::models::Credential;

/// Load/save capability for the persisted credential
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Identifies the persisted record; callers serialize refreshes per location
    fn location(&self) -> String;

    /// `Ok(None)` when nothing has been stored yet
    async fn load(&self) -> Result<Option<Credential>>;

    /// Overwrite the stored record
    async fn save(&self, credential: &Credential) -> Result<()>;
}

/// JSON token file on disk
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock_key: String,
}

impl FileCredentialStore {
    /// Resolves the lock key once; every spelling of one file maps to the same key
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_key = resolve_lock_key(&path);
        Self { path, lock_key }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "token.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn location(&self) -> String {
        self.lock_key.clone()
    }

    async fn load(&self) -> Result<Option<Credential>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No token file at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            TriageError::ParseError(format!("Unreadable token file {:?}: {}", self.path, e))
        })?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(credential)?;
        let temp_path = self.temp_path();

        // Write the sibling file first so readers never observe a half-written token
        let written = async {
            tokio::fs::write(&temp_path, json).await?;
            secure_token_file(&temp_path).await?;
            tokio::fs::rename(&temp_path, &self.path).await?;
            Ok::<(), TriageError>(())
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tracing::debug!("Saved credential to {:?}", self.path);
        Ok(())
    }
}

/// Absolute path with `.` and `..` removed, without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Canonical form of the nearest existing ancestor plus the not-yet-created tail
fn resolve_lock_key(path: &Path) -> String {
    let normalized = normalize_lexically(path);

    let mut existing = normalized.as_path();
    let mut missing: Vec<&OsStr> = Vec::new();
    let resolved = loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            break missing
                .iter()
                .rev()
                .fold(canonical, |resolved, part| resolved.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break normalized.clone(),
        }
    };

    resolved.to_string_lossy().into_owned()
}

/// In-process store, mostly for tests and embedding
///
/// `with_io_delay` makes every load/save sleep first, which widens race windows.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    name: String,
    slot: Mutex<Option<Credential>>,
    saves: AtomicUsize,
    io_delay: Option<Duration>,
}

impl MemoryCredentialStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_credential(self, credential: Credential) -> Self {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(credential);
        self
    }

    pub fn with_io_delay(mut self, delay: Duration) -> Self {
        self.io_delay = Some(delay);
        self
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current record without going through the async interface
    pub fn snapshot(&self) -> Option<Credential> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    async fn simulate_io(&self) {
        if let Some(delay) = self.io_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn location(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn load(&self) -> Result<Option<Credential>> {
        self.simulate_io().await;
        Ok(self.snapshot())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        self.simulate_io().await;
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
