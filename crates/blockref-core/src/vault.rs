//! Vault access: listing and reading the note files that feed the index.
//!
//! Paths crossing this boundary are vault-relative and `/`-separated
//! (`pages/My Note.md`), whatever the host platform uses.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use blockref_config::VaultConfig;
use globset::{Glob, GlobSet, GlobSetBuilder};
use parking_lot::RwLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};

/// The file store the index is built from.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Every indexable file, vault-relative, sorted.
    async fn list_files(&self) -> Result<Vec<String>>;

    /// Full text of one file.
    async fn read(&self, path: &str) -> Result<String>;
}

/// A vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    config: VaultConfig,
    ignore: GlobSet,
}

impl FsVault {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore {
            let glob = Glob::new(pattern)
                .map_err(|e| IndexError::vault(pattern.as_str(), format!("invalid ignore pattern: {e}")))?;
            builder.add(glob);
        }
        let ignore = builder
            .build()
            .map_err(|e| IndexError::vault(config.root.display().to_string(), e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            ignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Absolute location of a vault-relative path.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.config.root.join(relative)
    }

    /// Vault-relative form of `path`, or `None` when it lies outside the vault.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.config.root).ok()?
        } else {
            path
        };
        to_vault_path(relative)
    }

    /// Whether a vault-relative path is one the index should contain.
    pub fn is_indexed(&self, relative: &str) -> bool {
        let path = Path::new(relative);
        let hidden = relative.split('/').any(|segment| segment.starts_with('.'));
        !hidden && self.config.is_indexed_extension(path) && !self.ignore.is_match(path)
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(IndexError::vault(relative, "path is not inside the vault"));
        }
        Ok(self.config.root.join(path))
    }
}

/// `/`-joined normal components of a relative path.
fn to_vault_path(relative: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!segments.is_empty()).then(|| segments.join("/"))
}

#[async_trait]
impl Vault for FsVault {
    async fn list_files(&self) -> Result<Vec<String>> {
        let vault = self.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkDir::new(&vault.config.root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0
                        || !entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable vault entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(relative) = entry
                    .path()
                    .strip_prefix(&vault.config.root)
                    .ok()
                    .and_then(to_vault_path)
                else {
                    continue;
                };
                if vault.is_indexed(&relative) {
                    files.push(relative);
                }
            }
            files.sort();
            files
        })
        .await
        .map_err(|e| IndexError::vault(self.config.root.display().to_string(), e.to_string()))?;

        debug!("Listed {} files under {}", files.len(), self.config.root.display());
        Ok(files)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let absolute = self.resolve(path)?;
        tokio::fs::read_to_string(&absolute)
            .await
            .map_err(|e| IndexError::vault(path, e.to_string()))
    }
}

/// An in-memory vault. Cloning shares the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    files: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add a file
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.files.write().remove(path)
    }

    pub fn rename(&self, from: &str, to: impl Into<String>) -> bool {
        let mut files = self.files.write();
        match files.remove(from) {
            Some(content) => {
                files.insert(to.into(), content);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.read().get(path).cloned()
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    async fn read(&self, path: &str) -> Result<String> {
        self.get(path)
            .ok_or_else(|| IndexError::vault(path, "no such file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vault_config(root: &Path) -> VaultConfig {
        VaultConfig {
            root: root.to_path_buf(),
            ..VaultConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fs_vault_lists_indexed_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("pages/nested")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("logseq/bak")).unwrap();
        std::fs::write(root.join("journal.md"), "- a").unwrap();
        std::fs::write(root.join("pages/nested/Deep.MD"), "- b").unwrap();
        std::fs::write(root.join("pages/image.png"), "png").unwrap();
        std::fs::write(root.join(".git/notes.md"), "- hidden").unwrap();
        std::fs::write(root.join(".hidden.md"), "- hidden").unwrap();
        std::fs::write(root.join("logseq/bak/old.md"), "- backup").unwrap();

        let vault = FsVault::new(&vault_config(root)).unwrap();
        let files = vault.list_files().await.unwrap();

        assert_eq!(files, vec!["journal.md", "pages/nested/Deep.MD"]);
    }

    #[tokio::test]
    async fn test_fs_vault_read_and_escape() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("page.md"), "- content").unwrap();

        let vault = FsVault::new(&vault_config(temp_dir.path())).unwrap();
        assert_eq!(vault.read("page.md").await.unwrap(), "- content");
        assert!(matches!(vault.read("../outside.md").await, Err(IndexError::Vault { .. })));
        assert!(matches!(vault.read("missing.md").await, Err(IndexError::Vault { .. })));
    }

    #[test]
    fn test_relative_paths() {
        let vault = FsVault::new(&vault_config(Path::new("/vault"))).unwrap();

        assert_eq!(
            vault.relative(Path::new("/vault/pages/a.md")),
            Some("pages/a.md".to_string())
        );
        assert_eq!(vault.relative(Path::new("/elsewhere/a.md")), None);
        assert!(vault.is_indexed("pages/a.md"));
        assert!(!vault.is_indexed("pages/.draft.md"));
        assert!(!vault.is_indexed("logseq/bak/a.md"));
        assert!(vault.is_indexed("pages/Upper.MD"));
        assert!(!vault.is_indexed("assets/image.png"));
        assert!(!vault.is_indexed("README"));
    }

    #[tokio::test]
    async fn test_memory_vault() {
        let vault = MemoryVault::new().with_file("b.md", "- b").with_file("a.md", "- a");

        assert_eq!(vault.list_files().await.unwrap(), vec!["a.md", "b.md"]);
        assert!(vault.rename("a.md", "c.md"));
        assert_eq!(vault.read("c.md").await.unwrap(), "- a");
        assert!(vault.read("a.md").await.is_err());
    }
}
