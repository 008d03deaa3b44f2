//! Session context and draft editing
//!
//! A session is an explicit per-user context object with a defined
//! lifecycle: created on session start, discarded on logout or explicit
//! reset. It buffers pending row edits as a [`ChangeSet`] (added, modified,
//! and deleted entry rows) until an explicit confirm-and-commit step.
//!
//! [`commit`] performs the writes as one logical unit from the caller's
//! perspective: every row is validated first and validation failures
//! accumulate - any failure aborts before a single write. The store offers
//! no multi-row transaction across these calls, so a write failure partway
//! through is reported with exactly what was and wasn't applied, never
//! swallowed.

use crate::store::{Store, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// A pending new entry row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedRow {
    pub metric_id: i64,
    pub value: f64,
    pub recorded_at: i64,
}

/// A pending edit to an existing entry row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedRow {
    pub entry_id: i64,
    pub value: f64,
    pub recorded_at: i64,
}

/// Buffered row-level edits awaiting an explicit commit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub added: Vec<AddedRow>,
    #[serde(default)]
    pub modified: Vec<ModifiedRow>,
    #[serde(default)]
    pub deleted: Vec<i64>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Which change-set row an issue refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "list", content = "index")]
pub enum RowRef {
    Added(usize),
    Modified(usize),
    Deleted(usize),
}

/// One validation problem found while checking a change set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: RowRef,
    pub message: String,
}

/// Counts of rows applied by a successful (or partial) commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub deleted: usize,
    pub updated: usize,
    pub added: usize,
}

/// Commit failure modes
#[derive(Error, Debug)]
pub enum CommitError {
    /// Validation found problems; nothing was written
    #[error("change set failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<RowIssue>),

    /// A write failed after some rows were already applied
    #[error("commit stopped at {row:?} after applying {} row(s): {source}", applied.deleted + applied.updated + applied.added)]
    Partial {
        applied: CommitOutcome,
        row: RowRef,
        source: StoreError,
    },
}

/// Validate and apply a change set against the store.
///
/// Deletions run first, then edits, then additions. Validation failures are
/// all collected up front and reported together.
pub fn commit(store: &Store, change_set: &ChangeSet) -> Result<CommitOutcome, CommitError> {
    let issues = validate(store, change_set);
    if !issues.is_empty() {
        return Err(CommitError::Invalid(issues));
    }

    let mut applied = CommitOutcome::default();

    for (index, entry_id) in change_set.deleted.iter().enumerate() {
        store.delete_entry(*entry_id).map_err(|source| CommitError::Partial {
            applied,
            row: RowRef::Deleted(index),
            source,
        })?;
        applied.deleted += 1;
    }

    for (index, row) in change_set.modified.iter().enumerate() {
        store
            .update_entry(row.entry_id, row.value, row.recorded_at)
            .map_err(|source| CommitError::Partial {
                applied,
                row: RowRef::Modified(index),
                source,
            })?;
        applied.updated += 1;
    }

    for (index, row) in change_set.added.iter().enumerate() {
        store
            .add_entry_at(row.metric_id, row.value, row.recorded_at)
            .map_err(|source| CommitError::Partial {
                applied,
                row: RowRef::Added(index),
                source,
            })?;
        applied.added += 1;
    }

    tracing::info!(
        deleted = applied.deleted,
        updated = applied.updated,
        added = applied.added,
        "Committed change set"
    );
    Ok(applied)
}

/// Check every row of a change set without writing anything
pub fn validate(store: &Store, change_set: &ChangeSet) -> Vec<RowIssue> {
    let mut issues = Vec::new();

    for (index, entry_id) in change_set.deleted.iter().enumerate() {
        if let Err(e) = store.get_entry(*entry_id) {
            issues.push(RowIssue {
                row: RowRef::Deleted(index),
                message: e.to_string(),
            });
        }
    }

    for (index, row) in change_set.modified.iter().enumerate() {
        let metric = match store.get_entry(row.entry_id) {
            Ok(entry) => store.get_metric(entry.metric_id),
            Err(e) => {
                issues.push(RowIssue {
                    row: RowRef::Modified(index),
                    message: e.to_string(),
                });
                continue;
            }
        };
        match metric {
            Ok(metric) => {
                if let Err(errs) = metric.unit.validate_value(row.value) {
                    for err in errs {
                        issues.push(RowIssue {
                            row: RowRef::Modified(index),
                            message: err.to_string(),
                        });
                    }
                }
            }
            Err(e) => issues.push(RowIssue {
                row: RowRef::Modified(index),
                message: e.to_string(),
            }),
        }
    }

    for (index, row) in change_set.added.iter().enumerate() {
        match store.get_metric(row.metric_id) {
            Ok(metric) => {
                if let Err(errs) = metric.unit.validate_value(row.value) {
                    for err in errs {
                        issues.push(RowIssue {
                            row: RowRef::Added(index),
                            message: err.to_string(),
                        });
                    }
                }
            }
            Err(e) => issues.push(RowIssue {
                row: RowRef::Added(index),
                message: e.to_string(),
            }),
        }
    }

    issues
}

/// Per-session state: identity, current selection, and the pending draft
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Opaque session identifier
    pub id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Metric the user is currently working with
    pub selected_metric: Option<i64>,
    /// Buffered edits awaiting confirm-and-commit
    pub draft: ChangeSet,
}

impl SessionContext {
    /// Create a fresh session with an empty draft
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            selected_metric: None,
            draft: ChangeSet::default(),
        }
    }

    /// Drop all pending edits
    pub fn discard_draft(&mut self) {
        self.draft = ChangeSet::default();
    }

    /// Take the draft out, leaving the session clean.
    ///
    /// Used at commit time: a successful commit must not leave the rows
    /// staged for a second application.
    pub fn take_draft(&mut self) -> ChangeSet {
        std::mem::take(&mut self.draft)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of live sessions, keyed by session id
#[derive(Default)]
pub struct Sessions {
    inner: Mutex<HashMap<String, SessionContext>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session and return its id
    pub fn create(&self) -> SessionContext {
        let session = SessionContext::new();
        self.inner
            .lock()
            .expect("session mutex poisoned")
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Run a closure against a session's mutable state
    pub fn with<T>(&self, id: &str, f: impl FnOnce(&mut SessionContext) -> T) -> Option<T> {
        self.inner
            .lock()
            .expect("session mutex poisoned")
            .get_mut(id)
            .map(f)
    }

    /// End a session, dropping any unsaved draft
    pub fn remove(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("session mutex poisoned")
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MetricSpec, UnitSpec, UnitType};
    use chrono::NaiveDate;

    fn store_with_metric() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let m = store
            .create_metric(&MetricSpec::new(
                "mood",
                UnitSpec::new(UnitType::IntegerRange).range(1, 10),
            ))
            .unwrap();
        (store, m.id)
    }

    fn ts(day: u32) -> i64 {
        NaiveDate::from_ymd_opt(2026, 2, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_commit_applies_all_three_lists() {
        let (store, metric_id) = store_with_metric();
        let keep = store.add_entry_at(metric_id, 5.0, ts(1)).unwrap();
        let doomed = store.add_entry_at(metric_id, 6.0, ts(2)).unwrap();

        let change_set = ChangeSet {
            added: vec![AddedRow {
                metric_id,
                value: 8.0,
                recorded_at: ts(3),
            }],
            modified: vec![ModifiedRow {
                entry_id: keep.id,
                value: 4.0,
                recorded_at: ts(1),
            }],
            deleted: vec![doomed.id],
        };

        let outcome = commit(&store, &change_set).unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.deleted, 1);

        let entries = store.entries_for_metric(metric_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, 4.0);
        assert_eq!(entries[1].value, 8.0);
    }

    #[test]
    fn test_invalid_change_set_writes_nothing() {
        let (store, metric_id) = store_with_metric();
        let existing = store.add_entry_at(metric_id, 5.0, ts(1)).unwrap();

        let change_set = ChangeSet {
            added: vec![
                AddedRow {
                    metric_id,
                    value: 7.0, // valid
                    recorded_at: ts(2),
                },
                AddedRow {
                    metric_id,
                    value: 12.0, // above max
                    recorded_at: ts(3),
                },
            ],
            modified: vec![ModifiedRow {
                entry_id: existing.id,
                value: 0.5, // non-integer and below min
                recorded_at: ts(1),
            }],
            deleted: vec![9999], // unknown entry
        };

        let err = commit(&store, &change_set).unwrap_err();
        match err {
            CommitError::Invalid(issues) => {
                // 1 unknown delete + 2 for the modified row + 1 for the bad add
                assert_eq!(issues.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The valid add must not have gone through either
        assert_eq!(store.entries_for_metric(metric_id).unwrap().len(), 1);
        assert_eq!(store.get_entry(existing.id).unwrap().value, 5.0);
    }

    #[test]
    fn test_empty_change_set_commits_cleanly() {
        let (store, _) = store_with_metric();
        let outcome = commit(&store, &ChangeSet::default()).unwrap();
        assert_eq!(outcome, CommitOutcome::default());
    }

    #[test]
    fn test_session_lifecycle() {
        let sessions = Sessions::new();
        let session = sessions.create();
        assert_eq!(sessions.len(), 1);

        sessions.with(&session.id, |s| {
            s.selected_metric = Some(7);
            s.draft.deleted.push(1);
        });
        let dirty = sessions.with(&session.id, |s| s.draft.len()).unwrap();
        assert_eq!(dirty, 1);

        sessions.with(&session.id, |s| s.discard_draft());
        let clean = sessions.with(&session.id, |s| s.draft.is_empty()).unwrap();
        assert!(clean);

        assert!(sessions.remove(&session.id));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_take_draft_leaves_session_clean() {
        let mut session = SessionContext::new();
        session.draft.deleted.push(3);

        let draft = session.take_draft();
        assert_eq!(draft.deleted, vec![3]);
        assert!(session.draft.is_empty());
    }
}
