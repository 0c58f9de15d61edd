//! Namespace manager (spec §3.5, §4.8).
//!
//! Grounded on `original_source/src/mcp_jive/namespace/namespace_manager.py`:
//! same reserved-name set, same validation pattern, same
//! directory-per-namespace isolation, carried over into idiomatic Rust
//! (an explicit `NamespaceError` instead of a raised exception, a `RwLock`
//! instead of no concurrency control at all since this server is
//! multi-threaded where the original was single-process asyncio).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*[A-Za-z0-9]$|^[A-Za-z0-9]$").unwrap());

fn reserved_names() -> &'static HashSet<&'static str> {
    static SET: Lazy<HashSet<&'static str>> = Lazy::new(|| {
        [
            "admin", "system", "config", "api", "health", "status", "backup", "restore",
            "migration", "temp", "tmp", "cache",
        ]
        .into_iter()
        .collect()
    });
    &SET
}

#[derive(Error, Debug, Clone)]
pub enum NamespaceError {
    #[error("namespace cannot be empty")]
    Empty,
    #[error("namespace '{0}' must be 1-50 characters")]
    BadLength(String),
    #[error("namespace '{0}' is reserved")]
    Reserved(String),
    #[error("namespace '{0}' contains invalid characters")]
    InvalidPattern(String),
    #[error("namespace '{0}' cannot be deleted")]
    CannotDelete(String),
    #[error("namespace '{0}' does not exist")]
    NotFound(String),
    #[error("io error for namespace '{namespace}': {source}")]
    Io { namespace: String, #[source] source: Arc<std::io::Error> },
}

impl From<(String, std::io::Error)> for NamespaceError {
    fn from((namespace, source): (String, std::io::Error)) -> Self {
        Self::Io { namespace, source: Arc::new(source) }
    }
}

/// Per-table row/size counters (spec §4.8 `stats`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub work_item_count: u64,
    pub execution_log_count: u64,
    pub bytes_on_disk: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamespaceMetadata {
    namespace: String,
    created_at: chrono::DateTime<chrono::Utc>,
    version: u32,
}

/// Manages isolated on-disk storage roots for namespaces.
pub struct NamespaceManager {
    base_dir: PathBuf,
    default_namespace: String,
    auto_create: bool,
    known: RwLock<HashSet<String>>,
}

impl NamespaceManager {
    /// Create a manager rooted at `base_dir`. Ensures the `default`
    /// namespace directory (which, per spec §6.4, is the base dir itself)
    /// exists.
    pub fn new(base_dir: impl Into<PathBuf>, default_namespace: impl Into<String>, auto_create: bool) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        std::fs::create_dir_all(base_dir.join("namespaces"))?;
        let default_namespace = default_namespace.into();
        let mut known = HashSet::new();
        known.insert(default_namespace.clone());
        Ok(Self { base_dir, default_namespace, auto_create, known: RwLock::new(known) })
    }

    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Validate a namespace label against spec §3.5.
    pub fn validate(&self, namespace: &str) -> Result<(), NamespaceError> {
        if namespace.is_empty() {
            return Err(NamespaceError::Empty);
        }
        if namespace.len() > 50 {
            return Err(NamespaceError::BadLength(namespace.to_string()));
        }
        if reserved_names().contains(namespace.to_lowercase().as_str()) {
            return Err(NamespaceError::Reserved(namespace.to_string()));
        }
        if !NAMESPACE_PATTERN.is_match(namespace) {
            return Err(NamespaceError::InvalidPattern(namespace.to_string()));
        }
        Ok(())
    }

    /// Resolution precedence per spec §4.3.3, applied by the dispatcher;
    /// this helper applies steps 4-5 only (environment default, literal
    /// `"default"`) since steps 1-3 require request/session context the
    /// dispatcher owns.
    #[must_use]
    pub fn environment_default(&self) -> &str {
        &self.default_namespace
    }

    /// Storage root for `namespace` (spec §6.4): `default` lives at the
    /// base dir, every other namespace under `namespaces/<name>/`.
    #[must_use]
    pub fn path(&self, namespace: &str) -> PathBuf {
        if namespace == self.default_namespace {
            self.base_dir.clone()
        } else {
            self.base_dir.join("namespaces").join(namespace)
        }
    }

    pub async fn exists(&self, namespace: &str) -> bool {
        if namespace == self.default_namespace {
            return true;
        }
        self.known.read().await.contains(namespace) || self.path(namespace).exists()
    }

    /// Create the on-disk root and `.namespace_metadata` for `namespace`.
    pub async fn create(&self, namespace: &str) -> Result<bool, NamespaceError> {
        self.validate(namespace)?;
        let path = self.path(namespace);
        if path.exists() {
            self.known.write().await.insert(namespace.to_string());
            return Ok(false);
        }
        std::fs::create_dir_all(&path).map_err(|e| (namespace.to_string(), e))?;
        let metadata = NamespaceMetadata {
            namespace: namespace.to_string(),
            created_at: chrono::Utc::now(),
            version: 1,
        };
        let metadata_path = path.join(".namespace_metadata");
        let body = serde_json::to_string_pretty(&metadata).unwrap_or_default();
        std::fs::write(&metadata_path, body).map_err(|e| (namespace.to_string(), e))?;
        self.known.write().await.insert(namespace.to_string());
        tracing::info!(namespace, path = %path.display(), "created namespace");
        Ok(true)
    }

    /// Ensure `namespace` exists, creating it if `auto_create` is enabled.
    pub async fn ensure_exists(&self, namespace: &str) -> Result<(), NamespaceError> {
        self.validate(namespace)?;
        if self.exists(namespace).await {
            return Ok(());
        }
        if self.auto_create {
            self.create(namespace).await?;
            Ok(())
        } else {
            Err(NamespaceError::NotFound(namespace.to_string()))
        }
    }

    /// Delete a namespace's entire directory tree. `default` can never be
    /// deleted (spec §4.8).
    pub async fn delete(&self, namespace: &str) -> Result<(), NamespaceError> {
        if namespace == self.default_namespace {
            return Err(NamespaceError::CannotDelete(namespace.to_string()));
        }
        self.validate(namespace)?;
        let path = self.path(namespace);
        if !path.exists() {
            return Err(NamespaceError::NotFound(namespace.to_string()));
        }
        std::fs::remove_dir_all(&path).map_err(|e| (namespace.to_string(), e))?;
        self.known.write().await.remove(namespace);
        tracing::info!(namespace, "deleted namespace");
        Ok(())
    }

    /// List known namespaces; `default` is always present (spec §4.8).
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.known.read().await.iter().cloned().collect();
        let namespaces_dir = self.base_dir.join("namespaces");
        if let Ok(entries) = std::fs::read_dir(&namespaces_dir) {
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        if !names.iter().any(|n| n == name) {
                            names.push(name.to_string());
                        }
                    }
                }
            }
        }
        if !names.iter().any(|n| n == &self.default_namespace) {
            names.push(self.default_namespace.clone());
        }
        names.sort();
        names
    }

    /// Directory size on disk, best-effort (used by `stats`).
    fn dir_size(path: &Path) -> u64 {
        let mut total = 0u64;
        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                if let Ok(meta) = entry.metadata() {
                    if meta.is_dir() {
                        total += Self::dir_size(&entry.path());
                    } else {
                        total += meta.len();
                    }
                }
            }
        }
        total
    }

    #[must_use]
    pub fn bytes_on_disk(&self, namespace: &str) -> u64 {
        Self::dir_size(&self.path(namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (NamespaceManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = NamespaceManager::new(dir.path(), "default", true).unwrap();
        (mgr, dir)
    }

    #[test]
    fn validate_rejects_reserved_names() {
        let (mgr, _dir) = manager();
        assert!(matches!(mgr.validate("admin"), Err(NamespaceError::Reserved(_))));
        assert!(matches!(mgr.validate("Admin"), Err(NamespaceError::Reserved(_))));
    }

    #[test]
    fn validate_rejects_bad_pattern() {
        let (mgr, _dir) = manager();
        assert!(mgr.validate("-leading-dash").is_err());
        assert!(mgr.validate("trailing-dash-").is_err());
        assert!(mgr.validate("has space").is_err());
        assert!(mgr.validate("a").is_ok());
        assert!(mgr.validate("ab").is_ok());
        assert!(mgr.validate("my-project_1").is_ok());
    }

    #[tokio::test]
    async fn default_cannot_be_deleted() {
        let (mgr, _dir) = manager();
        assert!(matches!(mgr.delete("default").await, Err(NamespaceError::CannotDelete(_))));
    }

    #[tokio::test]
    async fn create_then_list_includes_namespace() {
        let (mgr, _dir) = manager();
        assert!(mgr.create("acme").await.unwrap());
        let list = mgr.list().await;
        assert!(list.contains(&"acme".to_string()));
        assert!(list.contains(&"default".to_string()));
        assert!(mgr.path("acme").join(".namespace_metadata").exists());
    }

    #[tokio::test]
    async fn ensure_exists_auto_creates() {
        let (mgr, _dir) = manager();
        mgr.ensure_exists("auto-created").await.unwrap();
        assert!(mgr.exists("auto-created").await);
    }

    #[tokio::test]
    async fn ensure_exists_without_auto_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = NamespaceManager::new(dir.path(), "default", false).unwrap();
        assert!(matches!(
            mgr.ensure_exists("missing").await,
            Err(NamespaceError::NotFound(_))
        ));
    }
}
