//! In-process configuration service.
//!
//! Holds the document in a concurrent map. Faults can be queued so callers
//! can observe rejected writes and failed loads without a network.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ConfigService, RemoteError};
use crate::document::{Category, ConfigurationDocument, Resource};

#[derive(Default)]
struct Faults {
    fetch: Option<String>,
    write: Option<String>,
}

/// `ConfigService` keeping everything in memory.
#[derive(Clone, Default)]
pub struct MemoryService {
    entries: Arc<DashMap<(Category, String), Resource>>,
    faults: Arc<Mutex<Faults>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an existing document.
    pub fn with_document(doc: ConfigurationDocument) -> Self {
        let svc = Self::new();
        for category in Category::ALL {
            for (name, resource) in doc.resources(category) {
                svc.entries.insert((category, name.clone()), resource.clone());
            }
        }
        svc
    }

    /// Make the next upsert or delete fail with `message`.
    pub fn reject_next(&self, message: impl Into<String>) {
        self.faults().write = Some(message.into());
    }

    /// Make the next fetch fail with `message`.
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        self.faults().fetch = Some(message.into());
    }

    /// Resource as the service currently holds it.
    pub fn get(&self, category: Category, name: &str) -> Option<Resource> {
        self.entries
            .get(&(category, name.to_string()))
            .map(|r| r.value().clone())
    }

    /// Number of writes that were accepted.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_write_fault(&self) -> Option<String> {
        self.faults().write.take()
    }

    fn take_fetch_fault(&self) -> Option<String> {
        self.faults().fetch.take()
    }
}

#[async_trait]
impl ConfigService for MemoryService {
    async fn fetch(&self) -> Result<ConfigurationDocument, RemoteError> {
        if let Some(message) = self.take_fetch_fault() {
            return Err(RemoteError::Transport(message));
        }

        let mut doc = ConfigurationDocument::default();
        for entry in self.entries.iter() {
            let (category, name) = entry.key();
            doc.put(*category, name.clone(), entry.value().clone());
        }
        Ok(doc)
    }

    async fn upsert(
        &self,
        category: Category,
        name: &str,
        resource: &Resource,
    ) -> Result<(), RemoteError> {
        if let Some(message) = self.take_write_fault() {
            return Err(RemoteError::Rejected { status: 400, message });
        }
        self.entries.insert((category, name.to_string()), resource.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, category: Category, name: &str) -> Result<(), RemoteError> {
        if let Some(message) = self.take_write_fault() {
            return Err(RemoteError::Rejected { status: 400, message });
        }
        self.entries.remove(&(category, name.to_string()));
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
