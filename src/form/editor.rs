//! Schema-driven resource editor.
//!
//! # Responsibilities
//! - Hold the EditDraft for exactly one resource identity
//! - Validate every field before submitting
//! - Submit changed fields as one upsert, one submission at a time
//!
//! # Design Decisions
//! - Opening another identity discards the draft wholesale
//! - The upsert runs in a spawned task; if the editor is dropped or retargeted
//!   meanwhile, the write still completes but its outcome is not applied to
//!   the form
//! - On rejection the draft is kept so the user can fix and resubmit

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;

use super::descriptor::FieldDescriptor;
use super::draft::{DraftError, EditDraft};
use super::validate::{validate_all, validate_name, FieldError, FieldErrors};
use crate::document::{Category, FieldValue, Fields};
use crate::observability::metrics;
use crate::store::ConfigStore;

pub type UpsertError = Box<dyn std::error::Error + Send + Sync>;

/// Callback persisting a submitted draft.
#[async_trait]
pub trait Upsert: Send + Sync {
    async fn upsert(&self, name: String, fields: Fields) -> Result<(), UpsertError>;
}

#[async_trait]
impl<F, Fut> Upsert for F
where
    F: Fn(String, Fields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UpsertError>> + Send + 'static,
{
    async fn upsert(&self, name: String, fields: Fields) -> Result<(), UpsertError> {
        (self)(name, fields).await
    }
}

/// Persists submissions of one category through the store.
#[derive(Clone)]
pub struct StoreUpsert {
    store: ConfigStore,
    category: Category,
}

impl StoreUpsert {
    pub fn new(store: ConfigStore, category: Category) -> Self {
        Self { store, category }
    }
}

#[async_trait]
impl Upsert for StoreUpsert {
    async fn upsert(&self, name: String, fields: Fields) -> Result<(), UpsertError> {
        self.store.update(self.category, &name, fields).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    InFlight,

    #[error("{} field(s) failed validation", .0.len())]
    Invalid(FieldErrors),

    #[error("upsert failed: {0}")]
    Rejected(#[source] UpsertError),

    #[error("submission task aborted: {0}")]
    Aborted(String),
}

/// What a view should show for the form as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorStatus {
    Clean,
    Dirty,
    Submitting,
    Failed(String),
}

struct EditorState {
    identity: String,
    items: Vec<FieldDescriptor>,
    draft: EditDraft,
    /// Bumped on every `open`; stale submissions compare against it.
    generation: u64,
    submitting: bool,
    errors: FieldErrors,
    failure: Option<String>,
}

impl EditorState {
    fn opened(identity: String, items: Vec<FieldDescriptor>, generation: u64) -> Self {
        Self {
            draft: EditDraft::new(&items),
            identity,
            items,
            generation,
            submitting: false,
            errors: FieldErrors::new(),
            failure: None,
        }
    }
}

/// Editor for one resource at a time.
pub struct FormEditor {
    title: String,
    description: String,
    on_upsert: Arc<dyn Upsert>,
    state: Arc<Mutex<EditorState>>,
}

fn lock(state: &Mutex<EditorState>) -> MutexGuard<'_, EditorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FormEditor {
    /// Editor for the resource `identity`, rendered from `items`.
    pub fn new(identity: impl Into<String>, items: Vec<FieldDescriptor>, on_upsert: impl Upsert + 'static) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            on_upsert: Arc::new(on_upsert),
            state: Arc::new(Mutex::new(EditorState::opened(identity.into(), items, 0))),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        lock(&self.state)
    }

    /// Retarget to another resource. Unsaved edits are discarded.
    pub fn open(&self, identity: impl Into<String>, items: Vec<FieldDescriptor>) {
        let mut state = self.state();
        let generation = state.generation + 1;
        *state = EditorState::opened(identity.into(), items, generation);
    }

    pub fn identity(&self) -> String {
        self.state().identity.clone()
    }

    pub fn items(&self) -> Vec<FieldDescriptor> {
        self.state().items.clone()
    }

    pub fn value(&self, id: &str) -> Option<FieldValue> {
        self.state().draft.value(id).cloned()
    }

    pub fn changed_fields(&self) -> Fields {
        self.state().draft.changed_fields()
    }

    pub fn is_dirty(&self) -> bool {
        self.state().draft.is_dirty()
    }

    pub fn field_errors(&self) -> FieldErrors {
        self.state().errors.clone()
    }

    pub fn field_error(&self, id: &str) -> Option<FieldError> {
        self.state().errors.get(id).cloned()
    }

    pub fn status(&self) -> EditorStatus {
        let state = self.state();
        if state.submitting {
            EditorStatus::Submitting
        } else if let Some(failure) = &state.failure {
            EditorStatus::Failed(failure.clone())
        } else if state.draft.is_dirty() {
            EditorStatus::Dirty
        } else {
            EditorStatus::Clean
        }
    }

    fn edit<T>(&self, id: &str, f: impl FnOnce(&mut EditDraft) -> Result<T, DraftError>) -> Result<T, DraftError> {
        let mut state = self.state();
        let out = f(&mut state.draft)?;
        state.errors.remove(id);
        Ok(out)
    }

    pub fn set_text(&self, id: &str, value: impl Into<String>) -> Result<(), DraftError> {
        self.edit(id, |draft| draft.set_text(id, value))
    }

    pub fn set_list(&self, id: &str, entries: Vec<String>) -> Result<(), DraftError> {
        self.edit(id, |draft| draft.set_list(id, entries))
    }

    pub fn push_entry(&self, id: &str, entry: impl Into<String>) -> Result<(), DraftError> {
        self.edit(id, |draft| draft.push_entry(id, entry))
    }

    pub fn remove_entry(&self, id: &str, index: usize) -> Result<String, DraftError> {
        self.edit(id, |draft| draft.remove_entry(id, index))
    }

    pub fn move_entry(&self, id: &str, from: usize, to: usize) -> Result<(), DraftError> {
        self.edit(id, |draft| draft.move_entry(id, from, to))
    }

    pub fn revert(&self, id: &str) {
        let mut state = self.state();
        state.draft.revert(id);
        state.errors.remove(id);
    }

    /// Validate without submitting; errors are kept for display.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut state = self.state();
        let result = check(&state);
        state.errors = result.clone().err().unwrap_or_default();
        result
    }

    /// Validate and submit the changed fields.
    ///
    /// Rejected while a previous submission of this editor is pending.
    /// Dropping the returned future does not cancel the write.
    pub async fn submit(&self) -> Result<(), SubmitError> {
        let (name, fields, generation) = {
            let mut state = self.state();
            if state.submitting {
                return Err(SubmitError::InFlight);
            }
            if let Err(errors) = check(&state) {
                for field in errors.keys() {
                    metrics::record_validation_failure(field);
                }
                tracing::debug!(identity = %state.identity, invalid = errors.len(), "Submission blocked by validation");
                state.errors = errors.clone();
                return Err(SubmitError::Invalid(errors));
            }
            state.errors.clear();
            state.failure = None;

            let fields = state.draft.changed_fields();
            if fields.is_empty() {
                tracing::debug!(identity = %state.identity, "Nothing changed, skipping submission");
                return Ok(());
            }
            state.submitting = true;
            (state.identity.clone(), fields, state.generation)
        };

        let on_upsert = self.on_upsert.clone();
        let view = Arc::downgrade(&self.state);
        let task = tokio::spawn(async move {
            let result = on_upsert.upsert(name, fields.clone()).await;
            settle(&view, generation, &fields, &result);
            result
        });

        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SubmitError::Rejected(e)),
            Err(e) => {
                let mut state = self.state();
                if state.generation == generation {
                    state.submitting = false;
                    state.failure = Some(e.to_string());
                }
                Err(SubmitError::Aborted(e.to_string()))
            }
        }
    }
}

fn check(state: &EditorState) -> Result<(), FieldErrors> {
    let mut errors = match validate_all(&state.items, |id| state.draft.value(id)) {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors,
    };
    if let Err(e) = validate_name(&state.identity) {
        errors.insert("name".to_string(), e);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Apply a finished submission to the form, unless the form is gone or now
/// shows another resource.
fn settle(view: &Weak<Mutex<EditorState>>, generation: u64, fields: &Fields, result: &Result<(), UpsertError>) {
    let Some(view) = view.upgrade() else {
        tracing::debug!("Editor closed before submission finished");
        return;
    };
    let mut state = lock(&view);
    if state.generation != generation {
        tracing::debug!(identity = %state.identity, "Ignoring outcome of a submission for a previous resource");
        return;
    }
    state.submitting = false;
    match result {
        Ok(()) => {
            state.draft.commit(fields);
            state.failure = None;
        }
        Err(e) => {
            tracing::warn!(identity = %state.identity, error = %e, "Submission failed, draft kept");
            state.failure = Some(e.to_string());
        }
    }
}
