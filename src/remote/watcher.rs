//! Reload the store when the backing config file changes on disk.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::store::ConfigStore;

/// Watches a file-backed document and refreshes the store on change.
pub struct FileWatcher {
    path: PathBuf,
    store: ConfigStore,
}

impl FileWatcher {
    pub fn new(path: &Path, store: ConfigStore) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
        }
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Watch the directory so rename-into-place is seen too.
        let target = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(target, RecursiveMode::NonRecursive)?;

        let store = self.store;
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Collapse bursts of events into one reload.
                while rx.try_recv().is_ok() {}
                tracing::info!("Config file change detected, reloading...");
                if let Err(e) = store.refresh().await {
                    tracing::error!("Failed to reload config: {}. Keeping current document.", e);
                }
            }
        });

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Category;
    use crate::remote::FileService;
    use crate::store::StoreEvent;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_external_edit_reloads_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pingap.toml");
        std::fs::write(&path, "[upstreams.charts]\naddrs = [\"127.0.0.1:5000\"]\n").unwrap();

        let store = ConfigStore::new(Arc::new(FileService::new(&path)));
        store.initialize().await.unwrap();
        let mut events = store.subscribe();
        let _watcher = FileWatcher::new(&path, store.clone()).run().unwrap();

        std::fs::write(&path, "[upstreams.diving]\naddrs = [\"127.0.0.1:6000\"]\n").unwrap();

        let reloaded = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Ok(StoreEvent::Loaded) = events.recv().await {
                    if store.resource(Category::Upstreams, "diving").unwrap().is_some() {
                        return;
                    }
                }
            }
        })
        .await;
        assert!(reloaded.is_ok(), "store was not refreshed after file change");
    }
}
