//! In-progress edits for one open form.

use std::collections::BTreeMap;
use thiserror::Error;

use super::descriptor::{FieldDescriptor, WidgetKind};
use crate::document::{FieldValue, Fields};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' is not a list")]
    NotAList(String),

    #[error("field '{0}' is a list")]
    NotText(String),

    #[error("field '{field}' has no entry {index}")]
    NoSuchEntry { field: String, index: usize },
}

/// Edited values layered over the values the form was opened with.
///
/// Only fields whose edited value differs from the baseline count as changed.
#[derive(Debug, Clone, Default)]
pub struct EditDraft {
    baseline: BTreeMap<String, Option<FieldValue>>,
    kinds: BTreeMap<String, WidgetKind>,
    edits: Fields,
}

impl EditDraft {
    pub fn new(items: &[FieldDescriptor]) -> Self {
        Self {
            baseline: items
                .iter()
                .map(|item| (item.id.clone(), item.default_value.clone()))
                .collect(),
            kinds: items.iter().map(|item| (item.id.clone(), item.kind.clone())).collect(),
            edits: Fields::new(),
        }
    }

    /// Current value: the edit if any, otherwise the baseline.
    pub fn value(&self, id: &str) -> Option<&FieldValue> {
        self.edits
            .get(id)
            .or_else(|| self.baseline.get(id).and_then(Option::as_ref))
    }

    fn kind(&self, id: &str) -> Result<&WidgetKind, DraftError> {
        self.kinds.get(id).ok_or_else(|| DraftError::UnknownField(id.to_string()))
    }

    pub fn set_text(&mut self, id: &str, value: impl Into<String>) -> Result<(), DraftError> {
        if self.kind(id)?.is_list() {
            return Err(DraftError::NotText(id.to_string()));
        }
        self.edits.insert(id.to_string(), FieldValue::Text(value.into()));
        Ok(())
    }

    pub fn set_list(&mut self, id: &str, entries: Vec<String>) -> Result<(), DraftError> {
        if !self.kind(id)?.is_list() {
            return Err(DraftError::NotAList(id.to_string()));
        }
        self.edits.insert(id.to_string(), FieldValue::List(entries));
        Ok(())
    }

    /// Copy-on-write access to a list field's entries.
    fn entries_mut(&mut self, id: &str) -> Result<&mut Vec<String>, DraftError> {
        if !self.kind(id)?.is_list() {
            return Err(DraftError::NotAList(id.to_string()));
        }
        if !self.edits.contains_key(id) {
            let current = match self.value(id) {
                Some(FieldValue::List(entries)) => entries.clone(),
                _ => Vec::new(),
            };
            self.edits.insert(id.to_string(), FieldValue::List(current));
        }
        match self.edits.get_mut(id) {
            Some(FieldValue::List(entries)) => Ok(entries),
            _ => Err(DraftError::NotAList(id.to_string())),
        }
    }

    /// Append an entry to the end of a list field.
    pub fn push_entry(&mut self, id: &str, entry: impl Into<String>) -> Result<(), DraftError> {
        self.entries_mut(id)?.push(entry.into());
        Ok(())
    }

    /// Remove the entry at `index`, keeping the order of the rest.
    pub fn remove_entry(&mut self, id: &str, index: usize) -> Result<String, DraftError> {
        let entries = self.entries_mut(id)?;
        if index >= entries.len() {
            return Err(DraftError::NoSuchEntry { field: id.to_string(), index });
        }
        Ok(entries.remove(index))
    }

    /// Move the entry at `from` so it ends up at `to`.
    pub fn move_entry(&mut self, id: &str, from: usize, to: usize) -> Result<(), DraftError> {
        let entries = self.entries_mut(id)?;
        let len = entries.len();
        for index in [from, to] {
            if index >= len {
                return Err(DraftError::NoSuchEntry { field: id.to_string(), index });
            }
        }
        let entry = entries.remove(from);
        entries.insert(to, entry);
        Ok(())
    }

    /// Drop the edit for one field.
    pub fn revert(&mut self, id: &str) {
        self.edits.remove(id);
    }

    /// Fields whose edited value differs from the baseline.
    pub fn changed_fields(&self) -> Fields {
        self.edits
            .iter()
            .filter(|(id, value)| self.baseline.get(*id).and_then(Option::as_ref) != Some(*value))
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    /// Every field that currently has a value, edited or not.
    pub fn all_fields(&self) -> Fields {
        self.baseline
            .keys()
            .filter_map(|id| self.value(id).map(|v| (id.clone(), v.clone())))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed_fields().is_empty()
    }

    /// Make `saved` the new baseline; edits equal to it stop being dirty.
    pub fn commit(&mut self, saved: &Fields) {
        for (id, value) in saved {
            self.baseline.insert(id.clone(), Some(value.clone()));
            if self.edits.get(id) == Some(value) {
                self.edits.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream_items() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("addrs", WidgetKind::Addrs).default_value(Vec::<String>::new()),
            FieldDescriptor::new("algo", WidgetKind::Text).default_value("round_robin"),
            FieldDescriptor::new("remark", WidgetKind::Text),
        ]
    }

    #[test]
    fn test_addrs_order_after_add_and_remove() {
        let mut draft = EditDraft::new(&upstream_items());
        draft.push_entry("addrs", "10.0.0.2:80").unwrap();
        draft.push_entry("addrs", "10.0.0.3:80").unwrap();
        assert_eq!(draft.remove_entry("addrs", 0).unwrap(), "10.0.0.2:80");

        assert_eq!(
            draft.changed_fields().get("addrs"),
            Some(&FieldValue::from(vec!["10.0.0.3:80"]))
        );
    }

    #[test]
    fn test_reorder_leaves_other_fields() {
        let mut draft = EditDraft::new(&upstream_items());
        draft.set_text("remark", "edge pool").unwrap();
        for addr in ["a:1", "b:2", "c:3"] {
            draft.push_entry("addrs", addr).unwrap();
        }
        draft.move_entry("addrs", 2, 0).unwrap();

        assert_eq!(draft.value("addrs"), Some(&FieldValue::from(vec!["c:3", "a:1", "b:2"])));
        assert_eq!(draft.value("remark"), Some(&FieldValue::from("edge pool")));
        assert!(matches!(
            draft.move_entry("addrs", 0, 3),
            Err(DraftError::NoSuchEntry { index: 3, .. })
        ));
    }

    #[test]
    fn test_only_real_changes_are_dirty() {
        let mut draft = EditDraft::new(&upstream_items());
        assert!(!draft.is_dirty());

        draft.set_text("algo", "round_robin").unwrap();
        assert!(!draft.is_dirty());

        // Empty string differs from absent.
        draft.set_text("remark", "").unwrap();
        assert_eq!(draft.changed_fields().len(), 1);
        assert_eq!(draft.value("remark"), Some(&FieldValue::from("")));
    }

    #[test]
    fn test_shape_errors() {
        let mut draft = EditDraft::new(&upstream_items());
        assert_eq!(draft.push_entry("algo", "x"), Err(DraftError::NotAList("algo".into())));
        assert_eq!(draft.set_text("addrs", "x"), Err(DraftError::NotText("addrs".into())));
        assert_eq!(draft.set_text("sni", "x"), Err(DraftError::UnknownField("sni".into())));
    }

    #[test]
    fn test_commit_clears_dirty() {
        let mut draft = EditDraft::new(&upstream_items());
        draft.set_text("algo", "hash:ip").unwrap();
        let saved = draft.changed_fields();

        draft.commit(&saved);
        assert!(!draft.is_dirty());
        assert_eq!(draft.value("algo"), Some(&FieldValue::from("hash:ip")));
    }
}
