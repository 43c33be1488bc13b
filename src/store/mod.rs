//! Client-side configuration store.
//!
//! # Data Flow
//! ```text
//! initialize()/refresh()
//!     → ConfigService::fetch
//!     → atomic swap of Arc<ConfigurationDocument>
//!     → StoreEvent::Loaded
//!
//! update(category, name, partial)
//!     → merge partial into cached record
//!     → ConfigService::upsert (whole merged record)
//!     → on success only: replace that one entry, StoreEvent::Upserted
//! ```
//!
//! # Design Decisions
//! - The store is the only path that mutates the cached document
//! - Readers get immutable snapshots; a refresh never blanks them
//! - Remote calls run in spawned tasks: dropping the caller's future does
//!   not cancel the write, and a completed write still lands in the cache
//! - Same-resource writes are not queued: the last response applied wins
//! - A refresh never undoes a write confirmed while it was in flight
//! - No retries and no schema validation here

mod state;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::document::{Category, ConfigurationDocument, Fields, Resource};
use crate::observability::metrics;
use crate::remote::{ConfigService, RemoteError};

pub use state::{Phase, StoreState};

/// Change notification emitted after each successful cache mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Loaded,
    LoadFailed(String),
    Upserted { category: Category, name: String },
    Removed { category: Category, name: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration is not loaded yet")]
    NotReady,

    #[error("configuration failed to load: {0}")]
    LoadFailed(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("store task aborted: {0}")]
    Aborted(String),
}

struct Inner {
    service: Arc<dyn ConfigService>,
    state: ArcSwap<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

/// Session-scoped cache of the configuration document.
///
/// Cloning is cheap; all clones share one cache.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<Inner>,
}

impl ConfigStore {
    pub fn new(service: Arc<dyn ConfigService>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                service,
                state: ArcSwap::from_pointee(StoreState::default()),
                events,
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<StoreState> {
        self.inner.state.load_full()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.load().phase
    }

    /// True once a document has been loaded, including during a refresh.
    pub fn initialized(&self) -> bool {
        self.inner.state.load().document.is_some()
    }

    /// Error of the most recent failed load, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.load().last_error.clone()
    }

    /// The cached document.
    ///
    /// Fails with `NotReady` before the first load completes and with
    /// `LoadFailed` when the first load failed; both are distinct from an
    /// empty document.
    pub fn data(&self) -> Result<Arc<ConfigurationDocument>, StoreError> {
        self.inner.state.load().document()
    }

    pub fn resource(&self, category: Category, name: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self.data()?.get(category, name).cloned())
    }

    pub fn names(&self, category: Category) -> Result<Vec<String>, StoreError> {
        Ok(self.data()?.resources(category).keys().cloned().collect())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Fetch the whole document and make it current.
    ///
    /// A fetch overtaken by a newer one is discarded when it resolves, and
    /// writes confirmed while it was in flight are kept.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let started = self.inner.state.rcu(|state| state.loading()).next_epoch();
        tracing::info!(phase = ?Phase::Loading, fetch = started, "Loading configuration document");

        let inner = self.inner.clone();
        run_detached(async move {
            let started_at = Instant::now();
            let fetched = inner.service.fetch().await;
            metrics::record_remote_duration("fetch", started_at.elapsed());

            match fetched {
                Ok(doc) => {
                    let doc = Arc::new(doc);
                    let previous = inner.state.rcu(|state| state.loaded(doc.clone(), started));
                    if previous.superseded(started) {
                        tracing::debug!(fetch = started, "Discarding document from an overtaken fetch");
                        return Ok(());
                    }
                    for category in Category::ALL {
                        metrics::record_resource_count(category, doc.resources(category).len());
                    }
                    metrics::record_store_operation("fetch", true);
                    tracing::info!("Configuration document loaded");
                    let _ = inner.events.send(StoreEvent::Loaded);
                    Ok(())
                }
                Err(e) => {
                    let message = e.to_string();
                    let previous = inner.state.rcu(|state| state.failed(message.clone(), started));
                    metrics::record_store_operation("fetch", false);
                    if previous.superseded(started) {
                        tracing::debug!(fetch = started, error = %message, "Overtaken fetch failed");
                        return Err(StoreError::Remote(e));
                    }
                    tracing::error!(error = %message, "Failed to load configuration document");
                    let _ = inner.events.send(StoreEvent::LoadFailed(message));
                    Err(StoreError::Remote(e))
                }
            }
        })
        .await
    }

    /// Reload while keeping the current document readable.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.initialize().await
    }

    /// Upsert: merge `fields` into `(category, name)`, creating it if absent.
    ///
    /// The cache entry is replaced only after the remote accepts the merged
    /// record; on failure the cache is untouched and the error is returned.
    pub async fn update(&self, category: Category, name: &str, fields: Fields) -> Result<(), StoreError> {
        let mut record = self.resource(category, name)?.unwrap_or_default();
        record.merge(fields);

        let inner = self.inner.clone();
        let name = name.to_string();
        run_detached(async move {
            let started = Instant::now();
            let written = inner.service.upsert(category, &name, &record).await;
            metrics::record_remote_duration("upsert", started.elapsed());

            if let Err(e) = written {
                metrics::record_store_operation("upsert", false);
                tracing::warn!(%category, name = %name, error = %e, "Upsert rejected, cache unchanged");
                return Err(StoreError::Remote(e));
            }

            inner.state.rcu(|state| state.with_entry(category, &name, Some(record.clone())));
            metrics::record_store_operation("upsert", true);
            tracing::info!(%category, name = %name, "Resource upserted");
            let _ = inner.events.send(StoreEvent::Upserted { category, name });
            Ok(())
        })
        .await
    }

    /// Delete `(category, name)`; the cache entry goes only after the remote confirms.
    pub async fn remove(&self, category: Category, name: &str) -> Result<(), StoreError> {
        self.data()?;

        let inner = self.inner.clone();
        let name = name.to_string();
        run_detached(async move {
            let started = Instant::now();
            let deleted = inner.service.delete(category, &name).await;
            metrics::record_remote_duration("delete", started.elapsed());

            if let Err(e) = deleted {
                metrics::record_store_operation("delete", false);
                tracing::warn!(%category, name = %name, error = %e, "Delete rejected, cache unchanged");
                return Err(StoreError::Remote(e));
            }

            inner.state.rcu(|state| state.with_entry(category, &name, None));
            metrics::record_store_operation("delete", true);
            tracing::info!(%category, name = %name, "Resource removed");
            let _ = inner.events.send(StoreEvent::Removed { category, name });
            Ok(())
        })
        .await
    }
}

/// Run `task` to completion even if the awaiting caller goes away.
async fn run_detached<F>(task: F) -> Result<(), StoreError>
where
    F: Future<Output = Result<(), StoreError>> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Aborted(e.to_string())),
    }
}

static GLOBAL: OnceCell<ConfigStore> = OnceCell::new();

/// Install the process-wide store. Returns false if one is already installed.
pub fn install(store: ConfigStore) -> bool {
    GLOBAL.set(store).is_ok()
}

/// The process-wide store, if installed.
pub fn global() -> Option<&'static ConfigStore> {
    GLOBAL.get()
}
