//! Optimistic writes.
//!
//! An update turns one diff into two things: a batch request for the
//! backend, and an override that shows the diff in the reconciled view
//! until that request settles. The override is removed on settlement
//! whether the write succeeded or not; the mirror was never touched, so a
//! failed write simply disappears from the view.

use crate::client::BatchOperation;
use crate::error::{ErrorHandler, MirrorError, Result};
use crate::state::{apply_diff, Override};
use crate::store::{RecordStore, Settlement};
use crate::types::{RecordId, RecordMap, RecordsDiff, RequestOptions};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The records an update touches, given directly or computed from the
/// current view.
pub enum UpdateDiff {
    Static(RecordsDiff),
    Computed(Box<dyn FnOnce(&RecordMap) -> RecordsDiff + Send>),
}

impl UpdateDiff {
    /// Compute the diff from a snapshot of the reconciled view taken when the
    /// update starts.
    pub fn from_fn(f: impl FnOnce(&RecordMap) -> RecordsDiff + Send + 'static) -> Self {
        UpdateDiff::Computed(Box::new(f))
    }

    fn resolve(self, view: impl FnOnce() -> RecordMap) -> RecordsDiff {
        match self {
            UpdateDiff::Static(diff) => diff,
            UpdateDiff::Computed(f) => f(&view()),
        }
    }
}

impl From<RecordsDiff> for UpdateDiff {
    fn from(diff: RecordsDiff) -> Self {
        UpdateDiff::Static(diff)
    }
}

impl fmt::Debug for UpdateDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateDiff::Static(diff) => f.debug_tuple("Static").field(diff).finish(),
            UpdateDiff::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Per-call configuration for `update`.
#[derive(Clone, Default)]
pub struct UpdateConfig {
    /// Passed through to the batch request.
    pub options: RequestOptions,

    /// Overrides the store's error handler for this call.
    pub on_error: Option<ErrorHandler>,

    /// Replaces the override derived from the diff.
    pub override_fn: Option<Override>,
}

impl UpdateConfig {
    pub fn with_options(options: RequestOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn on_error(mut self, handler: impl Fn(&MirrorError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn override_with(
        mut self,
        apply: impl Fn(&RecordMap) -> RecordMap + Send + Sync + 'static,
    ) -> Self {
        self.override_fn = Some(Arc::new(apply));
        self
    }
}

/// Parse a diff from a JSON object of `id -> update | null`.
pub fn parse_diff(value: Value) -> Result<RecordsDiff> {
    let Value::Object(entries) = value else {
        return Err(MirrorError::InvalidRecord(
            "diff must be an object keyed by record id".to_string(),
        ));
    };

    entries
        .into_iter()
        .map(|(id, update)| match update {
            Value::Null => Ok((RecordId(id), None)),
            Value::Object(fields) => Ok((RecordId(id), Some(fields))),
            other => Err(MirrorError::InvalidRecord(format!(
                "update for {} must be an object or null, got {}",
                id, other
            ))),
        })
        .collect()
}

/// Override that applies `diff` to whatever snapshot it is given.
pub fn override_from_diff(diff: RecordsDiff) -> Override {
    Arc::new(move |records: &RecordMap| apply_diff(records, &diff))
}

/// Translate a diff into batch operations, in id order.
pub fn batch_operations(diff: &RecordsDiff) -> Vec<BatchOperation> {
    diff.iter()
        .map(|(id, update)| match update {
            Some(fields) => {
                let mut fields = fields.clone();
                fields.remove("id");
                BatchOperation::Upsert {
                    id: id.clone(),
                    fields,
                }
            }
            None => BatchOperation::Delete { id: id.clone() },
        })
        .collect()
}

impl RecordStore {
    /// Write `diff` to the backend, showing it in the view until the write
    /// settles.
    ///
    /// Overrides stack in call order, so for overlapping fields the most
    /// recent call wins in the view no matter which request finishes first.
    /// Errors go to the error handler; this never fails.
    pub async fn update(&self, diff: impl Into<UpdateDiff>, config: UpdateConfig) -> Settlement {
        self.shared.finish_teardown().await;

        let diff = diff.into().resolve(|| self.snapshot());
        if diff.is_empty() {
            tracing::debug!("skipping empty update");
            return Settlement::Committed;
        }

        let operations = batch_operations(&diff);
        let apply = match config.override_fn {
            Some(apply) => apply,
            None => override_from_diff(diff),
        };

        let token = self.shared.push_override(apply);
        // Removed even if this future is dropped mid-request.
        let _overlay = scopeguard::guard(token, |token| self.shared.remove_override(token));

        let total = operations.len();
        match self.client().batch_write(operations, &config.options).await {
            Ok(()) => {
                tracing::debug!(operations = total, "batch write committed");
                Settlement::Committed
            }
            Err(error) => {
                self.report(config.on_error.as_ref(), &error);
                Settlement::Rejected
            }
        }
    }
}
