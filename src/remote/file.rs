//! File-backed configuration service.
//!
//! The whole document lives in one TOML file:
//!
//! ```toml
//! [upstreams.charts]
//! addrs = ["127.0.0.1:5000", "127.0.0.1:5001 10"]
//! algo = "round_robin"
//! ```
//!
//! Writes are read-modify-write under a lock and land via rename, so a reader
//! never sees a half-written file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{ConfigService, RemoteError};
use crate::document::{Category, ConfigurationDocument, Resource};

pub struct FileService {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<ConfigurationDocument, RemoteError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?self.path, "Config file missing, starting empty");
                return Ok(ConfigurationDocument::default());
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn write(&self, doc: &ConfigurationDocument) -> Result<(), RemoteError> {
        let content = toml::to_string(doc).map_err(|e| RemoteError::Decode(e.to_string()))?;
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigService for FileService {
    async fn fetch(&self) -> Result<ConfigurationDocument, RemoteError> {
        self.read().await
    }

    async fn upsert(
        &self,
        category: Category,
        name: &str,
        resource: &Resource,
    ) -> Result<(), RemoteError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read().await?;
        doc.put(category, name, resource.clone());
        self.write(&doc).await
    }

    async fn delete(&self, category: Category, name: &str) -> Result<(), RemoteError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read().await?;
        if doc.take(category, name).is_none() {
            return Err(RemoteError::Rejected {
                status: 404,
                message: format!("{} '{}' not found", category, name),
            });
        }
        self.write(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty_document() {
        let dir = TempDir::new().unwrap();
        let svc = FileService::new(dir.path().join("pingap.toml"));
        assert!(svc.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_persists_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pingap.toml");
        let svc = FileService::new(&path);

        let mut upstream = Resource::new();
        upstream.set("addrs", vec!["127.0.0.1:5000", "127.0.0.1:5001 10"]);
        upstream.set("read_timeout", "30s");
        svc.upsert(Category::Upstreams, "charts", &upstream).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("127.0.0.1:5001 10"));

        let reloaded = FileService::new(&path).fetch().await.unwrap();
        assert_eq!(reloaded.get(Category::Upstreams, "charts"), Some(&upstream));
    }

    #[tokio::test]
    async fn test_delete_unknown_is_rejected() {
        let dir = TempDir::new().unwrap();
        let svc = FileService::new(dir.path().join("pingap.toml"));
        let err = svc.delete(Category::Locations, "lo").await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_malformed_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pingap.toml");
        std::fs::write(&path, "[upstreams.charts\naddrs = ").unwrap();
        let err = FileService::new(&path).fetch().await.unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }
}
