//! In-memory record state between load and save.
//!
//! [`Tracked`] pairs a live record with the state it had when it was last
//! loaded or saved. Pending changes are computed by comparing the two through
//! the tracked-field accessors, which yields a [`PendingMutation`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::error::ChronicleResult;
use crate::records::Versionable;
use crate::versioning::TrackedFields;

/// Prior and current value of a changed field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub prior: Value,
    pub current: Value,
}

/// What a save is about to change, relative to the last persisted state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingMutation {
    fields: BTreeMap<&'static str, FieldChange>,
    actor: Option<(Option<String>, Option<String>)>,
    updated_at: Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)>,
}

impl PendingMutation {
    /// Compare `current` against `baseline` field by field.
    pub fn compute<R: Versionable>(
        fields: &TrackedFields<R>,
        baseline: &R,
        current: &R,
    ) -> ChronicleResult<Self> {
        let mut changes = BTreeMap::new();
        for field in fields.iter() {
            let prior = field.get(baseline)?;
            let now = field.get(current)?;
            if prior != now {
                changes.insert(
                    field.name(),
                    FieldChange {
                        prior,
                        current: now,
                    },
                );
            }
        }

        let actor = (baseline.actor() != current.actor()).then(|| {
            (
                baseline.actor().map(str::to_string),
                current.actor().map(str::to_string),
            )
        });
        let updated_at = (baseline.updated_at() != current.updated_at())
            .then(|| (baseline.updated_at(), current.updated_at()));

        Ok(Self {
            fields: changes,
            actor,
            updated_at,
        })
    }

    /// Change of a tracked field, if it changed.
    pub fn field(&self, name: &str) -> Option<&FieldChange> {
        self.fields.get(name)
    }

    /// Names of the tracked fields that changed.
    pub fn changed_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// True when no tracked field changed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn actor_changed(&self) -> bool {
        self.actor.is_some()
    }

    /// Actor before this mutation, when the actor changed.
    pub fn prior_actor(&self) -> Option<&str> {
        self.actor.as_ref().and_then(|(prior, _)| prior.as_deref())
    }

    pub fn updated_at_changed(&self) -> bool {
        self.updated_at.is_some()
    }
}

/// A record together with its last persisted state.
#[derive(Debug, Clone)]
pub struct Tracked<R> {
    record: R,
    baseline: Option<R>,
    version_message: Option<String>,
    rolling_back: bool,
}

impl<R: Versionable> Tracked<R> {
    /// Wrap a record that has never been persisted.
    pub fn new(record: R) -> Self {
        Self {
            record,
            baseline: None,
            version_message: None,
            rolling_back: false,
        }
    }

    /// Wrap a record just read from storage.
    pub fn loaded(record: R) -> Self {
        Self {
            baseline: Some(record.clone()),
            record,
            version_message: None,
            rolling_back: false,
        }
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// State as of the last load or save. `None` for new records.
    pub fn baseline(&self) -> Option<&R> {
        self.baseline.as_ref()
    }

    /// True until the record has been saved once.
    pub fn is_new(&self) -> bool {
        self.baseline.is_none()
    }

    /// Annotate the next snapshot. Cleared by the save that uses it.
    pub fn set_version_message(&mut self, message: impl Into<String>) {
        self.version_message = Some(message.into());
    }

    pub fn version_message(&self) -> Option<&str> {
        self.version_message.as_deref()
    }

    /// True while a rollback save is in flight.
    pub fn is_rolling_back(&self) -> bool {
        self.rolling_back
    }

    /// Changes since the last load or save. Empty for new records.
    pub fn pending(&self, fields: &TrackedFields<R>) -> ChronicleResult<PendingMutation> {
        match &self.baseline {
            Some(baseline) => PendingMutation::compute(fields, baseline, &self.record),
            None => Ok(PendingMutation::default()),
        }
    }

    pub fn into_inner(self) -> R {
        self.record
    }

    pub(crate) fn begin_rollback(&mut self) {
        self.rolling_back = true;
    }

    pub(crate) fn end_rollback(&mut self) {
        self.rolling_back = false;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.baseline = Some(self.record.clone());
        self.version_message = None;
        self.rolling_back = false;
    }
}

impl<R> Deref for Tracked<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

impl<R> DerefMut for Tracked<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.record
    }
}
