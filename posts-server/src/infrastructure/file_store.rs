use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::error::DomainError;

/// Blob storage addressed by relative `folder/name` paths.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `data` as `folder/name`, replacing any previous file, and
    /// returns the stored path.
    async fn put_file_as(&self, folder: &str, name: &str, data: Bytes)
    -> Result<String, DomainError>;
    /// Removes the file. A path that does not exist is not an error.
    async fn delete(&self, path: &str) -> Result<(), DomainError>;
    async fn get(&self, path: &str) -> Result<Option<Bytes>, DomainError>;
    async fn exists(&self, path: &str) -> Result<bool, DomainError>;
}

pub fn join_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Only plain relative components; no root, `.` or `..`.
fn checked_relative(path: &str) -> Result<&Path, DomainError> {
    let p = Path::new(path);
    let plain = !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(p)
    } else {
        Err(DomainError::Storage(format!("invalid storage path: {:?}", path)))
    }
}

/// Files on local disk below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, DomainError> {
        Ok(self.root.join(checked_relative(path)?))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put_file_as(
        &self,
        folder: &str,
        name: &str,
        data: Bytes,
    ) -> Result<String, DomainError> {
        let path = join_path(folder, name);
        let target = self.resolve(&path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| DomainError::Storage(format!("write {}: {}", target.display(), e)))?;

        debug!(path = %path, bytes = data.len(), "file stored");
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<(), DomainError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = %path, "file deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::Storage(format!(
                "delete {}: {}",
                target.display(),
                e
            ))),
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, DomainError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::Storage(format!(
                "read {}: {}",
                target.display(),
                e
            ))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, DomainError> {
        let target = self.resolve(path)?;
        tokio::fs::try_exists(&target)
            .await
            .map_err(|e| DomainError::Storage(format!("stat {}: {}", target.display(), e)))
    }
}

/// Files kept in memory; pairs with the in-memory post store.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put_file_as(
        &self,
        folder: &str,
        name: &str,
        data: Bytes,
    ) -> Result<String, DomainError> {
        let path = join_path(folder, name);
        checked_relative(&path)?;
        self.files.write().await.insert(path.clone(), data);
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<(), DomainError> {
        checked_relative(path)?;
        self.files.write().await.remove(path);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, DomainError> {
        checked_relative(path)?;
        Ok(self.files.read().await.get(path).cloned())
    }

    async fn exists(&self, path: &str) -> Result<bool, DomainError> {
        checked_relative(path)?;
        Ok(self.files.read().await.contains_key(path))
    }
}
