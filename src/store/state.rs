//! Store lifecycle state.
//!
//! ```text
//! Uninitialized → Loading → Ready
//!                        ↘ Failed → Loading (initialize again)
//! Ready → Loading (refresh, document stays readable) → Ready
//! ```
//!
//! Each transition builds a new immutable `StoreState`; the store swaps it in
//! atomically.
//!
//! Every fetch start and every entry write takes the next epoch. A fetched
//! document only lands if no newer fetch started, and entries written after
//! its fetch started are re-applied on top of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::StoreError;
use crate::document::{Category, ConfigurationDocument, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Last confirmed write per entry: epoch and the value written (`None` = removed).
type WriteLog = BTreeMap<(Category, String), (u64, Option<Resource>)>;

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub phase: Phase,
    /// Last successfully loaded document, kept across refreshes.
    pub document: Option<Arc<ConfigurationDocument>>,
    pub last_error: Option<String>,
    epoch: u64,
    /// Epoch of the most recently started fetch.
    latest_fetch: u64,
    writes: WriteLog,
}

impl StoreState {
    /// Start a fetch; its epoch is `self.epoch + 1`.
    pub(super) fn loading(&self) -> StoreState {
        let epoch = self.epoch + 1;
        StoreState {
            phase: Phase::Loading,
            epoch,
            latest_fetch: epoch,
            ..self.clone()
        }
    }

    /// Epoch the fetch started by `loading()` on this state will carry.
    pub(super) fn next_epoch(&self) -> u64 {
        self.epoch + 1
    }

    /// A fetch started at `started` was overtaken by a newer one.
    pub(super) fn superseded(&self, started: u64) -> bool {
        started < self.latest_fetch
    }

    pub(super) fn loaded(&self, document: Arc<ConfigurationDocument>, started: u64) -> StoreState {
        if self.superseded(started) {
            return self.clone();
        }

        let mut document = document;
        for ((category, name), (epoch, resource)) in &self.writes {
            if *epoch <= started {
                continue;
            }
            let doc = Arc::make_mut(&mut document);
            match resource {
                Some(resource) => doc.put(*category, name.clone(), resource.clone()),
                None => {
                    doc.take(*category, name);
                }
            }
        }

        StoreState {
            phase: Phase::Ready,
            document: Some(document),
            last_error: None,
            epoch: self.epoch,
            latest_fetch: self.latest_fetch,
            writes: WriteLog::new(),
        }
    }

    /// A failed refresh keeps serving the previous document.
    pub(super) fn failed(&self, error: String, started: u64) -> StoreState {
        if self.superseded(started) {
            return self.clone();
        }
        let phase = if self.document.is_some() {
            Phase::Ready
        } else {
            Phase::Failed
        };
        StoreState {
            phase,
            last_error: Some(error),
            ..self.clone()
        }
    }

    /// Replace or drop exactly one entry.
    pub(super) fn with_entry(
        &self,
        category: Category,
        name: &str,
        resource: Option<Resource>,
    ) -> StoreState {
        let Some(current) = &self.document else {
            return self.clone();
        };
        let epoch = self.epoch + 1;
        let mut writes = self.writes.clone();
        writes.insert((category, name.to_string()), (epoch, resource.clone()));
        let mut doc = ConfigurationDocument::clone(current);
        match resource {
            Some(resource) => doc.put(category, name, resource),
            None => {
                doc.take(category, name);
            }
        }
        StoreState {
            phase: self.phase,
            document: Some(Arc::new(doc)),
            last_error: self.last_error.clone(),
            epoch,
            latest_fetch: self.latest_fetch,
            writes,
        }
    }

    pub(super) fn document(&self) -> Result<Arc<ConfigurationDocument>, StoreError> {
        match (&self.document, self.phase) {
            (Some(doc), _) => Ok(doc.clone()),
            (None, Phase::Failed) => Err(StoreError::LoadFailed(
                self.last_error.clone().unwrap_or_default(),
            )),
            (None, _) => Err(StoreError::NotReady),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(algo: &str) -> Resource {
        let mut upstream = Resource::new();
        upstream.set("addrs", vec!["10.0.0.1:80"]);
        upstream.set("algo", algo);
        upstream
    }

    fn fetched(algo: &str) -> Arc<ConfigurationDocument> {
        let mut doc = ConfigurationDocument::default();
        doc.put(Category::Upstreams, "x", upstream(algo));
        Arc::new(doc)
    }

    fn ready(doc: Arc<ConfigurationDocument>) -> StoreState {
        let state = StoreState::default();
        let started = state.next_epoch();
        state.loading().loaded(doc, started)
    }

    fn algo(state: &StoreState) -> Option<String> {
        let doc = state.document().unwrap();
        doc.get(Category::Upstreams, "x")
            .and_then(|r| r.text("algo"))
            .map(String::from)
    }

    #[test]
    fn test_loading_before_first_document_is_not_ready() {
        let state = StoreState::default().loading();
        assert_eq!(state.phase, Phase::Loading);
        assert!(matches!(state.document(), Err(StoreError::NotReady)));
    }

    #[test]
    fn test_refresh_serves_stale_document() {
        let doc = Arc::new(ConfigurationDocument::default());
        let state = ready(doc.clone()).loading();
        assert_eq!(state.phase, Phase::Loading);
        assert!(Arc::ptr_eq(&state.document().unwrap(), &doc));
    }

    #[test]
    fn test_with_entry_leaves_old_snapshot_untouched() {
        let state = ready(Arc::new(ConfigurationDocument::default()));
        let before = state.document().unwrap();

        let after = state.with_entry(Category::Upstreams, "x", Some(upstream("hash:ip")));

        assert!(before.get(Category::Upstreams, "x").is_none());
        assert!(after.document().unwrap().get(Category::Upstreams, "x").is_some());
    }

    #[test]
    fn test_write_during_fetch_survives_older_document() {
        let state = ready(fetched("round_robin"));
        let started = state.next_epoch();
        let state = state
            .loading()
            .with_entry(Category::Upstreams, "x", Some(upstream("hash:ip")))
            .loaded(fetched("round_robin"), started);

        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(algo(&state).as_deref(), Some("hash:ip"));
    }

    #[test]
    fn test_remove_during_fetch_survives_older_document() {
        let state = ready(fetched("round_robin"));
        let started = state.next_epoch();
        let state = state
            .loading()
            .with_entry(Category::Upstreams, "x", None)
            .loaded(fetched("round_robin"), started);

        assert!(state.document().unwrap().get(Category::Upstreams, "x").is_none());
    }

    #[test]
    fn test_writes_before_fetch_are_not_replayed() {
        let state = ready(fetched("round_robin"))
            .with_entry(Category::Upstreams, "x", Some(upstream("hash:ip")));
        let started = state.next_epoch();
        // Another client changed the record after our write.
        let state = state.loading().loaded(fetched("hash:url"), started);

        assert_eq!(algo(&state).as_deref(), Some("hash:url"));
    }

    #[test]
    fn test_older_fetch_result_is_dropped() {
        let state = ready(fetched("round_robin"));
        let first = state.next_epoch();
        let state = state.loading();
        let second = state.next_epoch();
        let state = state.loading();

        let state = state.loaded(fetched("hash:url"), second);
        let state = state.loaded(fetched("round_robin"), first);
        assert_eq!(algo(&state).as_deref(), Some("hash:url"));

        // A late failure of the older fetch is ignored too.
        let state = state.failed("timeout".into(), first);
        assert!(state.last_error.is_none());
    }
}
