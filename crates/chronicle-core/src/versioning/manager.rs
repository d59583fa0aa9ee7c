//! Versioning policy for one record type.
//!
//! [`Versioning`] owns the tracked-field declaration of a record type and the
//! stores it persists to. It decides when a save produces a snapshot, resolves
//! history positions, and applies past snapshots back onto live records.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::VersioningConfig;
use crate::db::Database;
use crate::diff::{diff_words, DiffFormat, WordDiff};
use crate::error::ChronicleResult;
use crate::records::{RecordStore, SqliteRecordStore, Versionable};
use crate::versioning::{
    NewVersion, PendingMutation, Position, SqliteVersionStore, TargetRef, Tracked,
    TrackedFields, Version, VersionData, VersionStore, VersionSummary,
};

/// Word diff of one field between two history positions.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDiff {
    pub field: String,
    pub format: DiffFormat,
    pub diff: WordDiff,
    /// `diff` rendered in `format`, safe to embed in HTML.
    pub rendered: String,
}

impl FieldDiff {
    /// True when the field content is the same at both positions.
    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }
}

/// All stored versions of one record, queried on each iteration.
pub struct VersionHistory<'a> {
    store: &'a dyn VersionStore,
    target: TargetRef,
}

impl VersionHistory<'_> {
    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    /// Fetch the versions, oldest first. Each call reads the store again.
    pub fn iter(&self) -> ChronicleResult<std::vec::IntoIter<Version>> {
        Ok(self.store.find_by_target(&self.target)?.into_iter())
    }

    pub fn to_vec(&self) -> ChronicleResult<Vec<Version>> {
        self.store.find_by_target(&self.target)
    }
}

/// Version tracking attached to record type `R`.
pub struct Versioning<R: Versionable> {
    db: Database,
    fields: TrackedFields<R>,
    records: Arc<dyn RecordStore<R>>,
    versions: Arc<dyn VersionStore>,
    config: VersioningConfig,
}

impl<R: Versionable> Versioning<R> {
    /// Attach versioning over explicit stores.
    ///
    /// Both stores must work against `db`: a save runs the snapshot and the
    /// record write in one transaction on its connection. The policy starts
    /// from `db.versioning_config()`.
    pub fn new(
        db: Database,
        fields: TrackedFields<R>,
        records: Arc<dyn RecordStore<R>>,
        versions: Arc<dyn VersionStore>,
    ) -> Self {
        debug!(
            target_type = R::TARGET_TYPE,
            fields = ?fields.names(),
            "versioning attached"
        );
        let config = db.versioning_config().clone();
        Self {
            db,
            fields,
            records,
            versions,
            config,
        }
    }

    /// Attach versioning backed by SQLite, registering `R` against `table`.
    pub fn sqlite(
        db: &Database,
        table: impl Into<String>,
        fields: TrackedFields<R>,
    ) -> ChronicleResult<Self> {
        let records: Arc<dyn RecordStore<R>> = Arc::new(SqliteRecordStore::<R>::new(db, table)?);
        let versions: Arc<dyn VersionStore> = Arc::new(SqliteVersionStore::new(db.clone())?);
        Ok(Self::new(db.clone(), fields, records, versions))
    }

    /// Builder: set the versioning policy.
    pub fn with_config(mut self, config: VersioningConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    pub fn fields(&self) -> &TrackedFields<R> {
        &self.fields
    }

    /// Names of the tracked fields.
    pub fn versioned_keys(&self) -> Vec<&'static str> {
        self.fields.names()
    }

    /// Version-store reference to `record`.
    pub fn target_of(record: &R) -> TargetRef {
        TargetRef::new(R::TARGET_TYPE, record.id())
    }

    /// Load a record for editing.
    pub fn find(&self, id: &str) -> ChronicleResult<Option<Tracked<R>>> {
        let conn = self.db.conn()?;
        Ok(self.records.find(&conn, id)?.map(Tracked::loaded))
    }

    /// Persist `doc`, snapshotting its prior state first when due.
    ///
    /// The snapshot, the history index append and the record write commit
    /// together or not at all; on error `doc` is left as it was. Returns the
    /// version created by this save, if any. After a successful save the
    /// in-memory history index matches storage.
    pub fn save(&self, doc: &mut Tracked<R>) -> ChronicleResult<Option<Version>> {
        let result = self.persist(doc);
        doc.end_rollback();
        result
    }

    fn persist(&self, doc: &mut Tracked<R>) -> ChronicleResult<Option<Version>> {
        let pending = doc.pending(&self.fields)?;
        let mut record = doc.record().clone();

        if self.config.touch_updated_at {
            let untouched = if doc.is_new() {
                record.updated_at().is_none()
            } else {
                !pending.updated_at_changed()
            };
            if untouched {
                record.set_updated_at(Utc::now());
            }
        }

        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let snapshot = self.maybe_snapshot(&tx, doc, &pending)?;
        if doc.is_new() {
            self.records.insert(&tx, &record)?;
        } else {
            self.records.update(&tx, &record)?;
        }
        let index = self.records.version_index(&tx, record.id())?;
        tx.commit()?;

        if let Some(index) = index {
            *record.version_index_mut() = index;
        }
        *doc.record_mut() = record;
        doc.mark_persisted();

        Ok(snapshot)
    }

    /// Pre-save hook: snapshot the tracked fields of `doc` on `conn` if
    /// this save should be recorded. Only ever run by [`save`](Self::save).
    fn maybe_snapshot(
        &self,
        conn: &Connection,
        doc: &Tracked<R>,
        pending: &PendingMutation,
    ) -> ChronicleResult<Option<Version>> {
        let record = doc.record();
        if doc.is_rolling_back() {
            debug!(id = record.id(), "snapshot skipped: rolling back");
            return Ok(None);
        }
        if doc.is_new() {
            debug!(id = record.id(), "snapshot skipped: new record");
            return Ok(None);
        }
        if self.config.skip_unchanged_saves && pending.is_empty() {
            debug!(id = record.id(), "snapshot skipped: no tracked change");
            return Ok(None);
        }

        let data = self.snapshot_data(record, pending)?;
        if data.is_empty() {
            debug!(id = record.id(), "snapshot skipped: empty data");
            return Ok(None);
        }
        let Some(user_id) = Self::resolve_actor(record, pending) else {
            debug!(id = record.id(), "snapshot skipped: no actor");
            return Ok(None);
        };

        let message = doc.version_message().unwrap_or_default();
        let version = self.versions.create_in(
            conn,
            NewVersion::new(Self::target_of(record), data, user_id).with_message(message),
        )?;

        info!(
            id = record.id(),
            target_type = R::TARGET_TYPE,
            version_id = ?version.id,
            changed = ?pending.changed_fields().collect::<Vec<_>>(),
            "recorded version"
        );
        Ok(Some(version))
    }

    /// Prior value for changed fields, current value for the rest.
    fn snapshot_data(&self, record: &R, pending: &PendingMutation) -> ChronicleResult<VersionData> {
        let mut data = VersionData::new();
        for field in self.fields.iter() {
            let value = match pending.field(field.name()) {
                Some(change) => change.prior.clone(),
                None => field.get(record)?,
            };
            data.insert(field.name().to_string(), value);
        }
        Ok(data)
    }

    /// Attributable actor of a save. A save whose record has no current
    /// actor has none. Otherwise the actor before this mutation if it
    /// changed, falling back to the current one.
    fn resolve_actor(record: &R, pending: &PendingMutation) -> Option<String> {
        let current = record.actor().filter(|actor| !actor.is_empty())?;
        let actor = pending
            .prior_actor()
            .filter(|actor| !actor.is_empty())
            .unwrap_or(current);
        Some(actor.to_string())
    }

    /// Unpersisted version built from the live record.
    pub fn current_version(&self, doc: &Tracked<R>) -> ChronicleResult<Version> {
        let pending = doc.pending(&self.fields)?;
        Ok(Version {
            id: None,
            target: Self::target_of(doc.record()),
            data: self.fields.project(doc.record())?,
            user_id: Self::resolve_actor(doc.record(), &pending).unwrap_or_default(),
            message: doc.version_message().unwrap_or_default().to_string(),
            created_at: Utc::now(),
        })
    }

    /// Resolve a history position. Out-of-range positions resolve to `None`.
    pub fn version_at(
        &self,
        doc: &Tracked<R>,
        position: Position,
    ) -> ChronicleResult<Option<Version>> {
        let index = doc.record().version_index();
        let id = match position {
            Position::Current => return self.current_version(doc).map(Some),
            Position::First => index.first(),
            Position::Last => index.last(),
            Position::Index(i) => index.id_at(i),
        };

        match id {
            Some(id) => self.versions.find_by_id(id),
            None => Ok(None),
        }
    }

    /// Newest version created at or before `timestamp`.
    pub fn version_at_time(
        &self,
        doc: &Tracked<R>,
        timestamp: DateTime<Utc>,
    ) -> ChronicleResult<Option<Version>> {
        self.versions
            .find_at_time(&Self::target_of(doc.record()), timestamp)
    }

    /// Restore the tracked fields from a past version and save.
    ///
    /// Defaults to the newest version, undoing the most recent recorded
    /// change. The actor and update timestamp are taken from the version
    /// unless the caller changed them. The restoring save is not itself
    /// snapshotted. Returns `false`, without saving, when the position does
    /// not exist.
    pub fn rollback(
        &self,
        doc: &mut Tracked<R>,
        position: Option<Position>,
    ) -> ChronicleResult<bool> {
        let position =
            position.unwrap_or_else(|| Position::default_rollback(doc.record().version_index()));
        let Some(version) = self.version_at(doc, position)? else {
            debug!(id = doc.record().id(), %position, "rollback target absent");
            return Ok(false);
        };

        let pending = doc.pending(&self.fields)?;
        self.fields.apply(doc.record_mut(), &version.data)?;
        if !pending.actor_changed() {
            doc.record_mut().set_actor(Some(version.user_id.clone()));
        }
        if !pending.updated_at_changed() {
            doc.record_mut().set_updated_at(version.created_at);
        }

        doc.begin_rollback();
        self.save(doc)?;

        info!(
            id = doc.record().id(),
            %position,
            version_id = ?version.id,
            "rolled back"
        );
        Ok(true)
    }

    /// Apply a past version to the in-memory record only.
    ///
    /// Same field semantics as [`rollback`](Self::rollback) but nothing is
    /// persisted and the actor and timestamp are left alone.
    pub fn load_version(
        &self,
        doc: &mut Tracked<R>,
        position: Option<Position>,
    ) -> ChronicleResult<bool> {
        let position =
            position.unwrap_or_else(|| Position::default_rollback(doc.record().version_index()));
        let Some(version) = self.version_at(doc, position)? else {
            debug!(id = doc.record().id(), %position, "load target absent");
            return Ok(false);
        };

        let applied = self.fields.apply(doc.record_mut(), &version.data)?;
        debug!(id = doc.record().id(), %position, applied, "loaded version");
        Ok(true)
    }

    /// Word diff of `field` between two positions.
    ///
    /// A position that does not resolve compares as empty content.
    pub fn diff(
        &self,
        doc: &Tracked<R>,
        field: &str,
        from: Position,
        to: Position,
        format: Option<DiffFormat>,
    ) -> ChronicleResult<FieldDiff> {
        let old = self
            .version_at(doc, from)?
            .map(|v| v.content(field))
            .unwrap_or_default();
        let new = self
            .version_at(doc, to)?
            .map(|v| v.content(field))
            .unwrap_or_default();

        let format = format.unwrap_or(self.config.default_diff_format);
        let diff = diff_words(&old, &new);
        Ok(FieldDiff {
            field: field.to_string(),
            format,
            rendered: diff.render(format),
            diff,
        })
    }

    /// Every stored version of `doc`, oldest first.
    pub fn versions(&self, doc: &Tracked<R>) -> VersionHistory<'_> {
        VersionHistory {
            store: self.versions.as_ref(),
            target: Self::target_of(doc.record()),
        }
    }

    pub fn summary(&self, doc: &Tracked<R>) -> ChronicleResult<Option<VersionSummary>> {
        self.versions.summary(&Self::target_of(doc.record()))
    }
}
