//! Filesystem abstraction used by the edit session and orchestrator.
//!
//! The [`FileStore`] trait keeps the pipeline independent of the real disk so
//! tests can inject slow or failing stores.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace the file's contents, creating it if needed.
    async fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Create a single directory; the parent must already exist.
    async fn create_dir(&self, path: &Path) -> Result<()>;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove an empty directory. Never recursive.
    async fn remove_dir(&self, path: &Path) -> Result<()>;
}

/// [`FileStore`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> Result<bool> {
        tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("stat {}", path.display()))
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display()))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("write {}", path.display()))
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir(path)
            .await
            .with_context(|| format!("create directory {}", path.display()))
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("remove {}", path.display()))
    }

    async fn remove_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_dir(path)
            .await
            .with_context(|| format!("remove directory {}", path.display()))
    }
}

/// Create every missing ancestor of `dir` (and `dir` itself), outermost first.
///
/// Returns only the directories this call created, in creation order. A
/// directory that appears concurrently is treated as pre-existing.
pub async fn create_missing_dirs(store: &dyn FileStore, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut cursor = Some(dir);
    while let Some(current) = cursor {
        if current.as_os_str().is_empty() || store.exists(current).await? {
            break;
        }
        missing.push(current.to_path_buf());
        cursor = current.parent();
    }

    let mut created = Vec::with_capacity(missing.len());
    for path in missing.into_iter().rev() {
        match store.create_dir(&path).await {
            Ok(()) => {
                debug!(dir = %path.display(), "created directory");
                created.push(path);
            }
            Err(_) if store.exists(&path).await? => {}
            Err(err) => return Err(err),
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_only_missing_dirs_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let existing = temp.path().join("src");
        std::fs::create_dir(&existing).expect("mkdir");

        let target = existing.join("a").join("b");
        let created = create_missing_dirs(&LocalFileStore, &target)
            .await
            .expect("create");

        assert_eq!(created, vec![existing.join("a"), existing.join("a").join("b")]);
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn existing_dir_creates_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let created = create_missing_dirs(&LocalFileStore, temp.path())
            .await
            .expect("create");
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn remove_dir_refuses_non_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("d");
        std::fs::create_dir(&dir).expect("mkdir");
        std::fs::write(dir.join("f"), "x").expect("write");

        assert!(LocalFileStore.remove_dir(&dir).await.is_err());
        assert!(dir.exists());
    }
}
