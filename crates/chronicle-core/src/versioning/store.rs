//! Version storage layer with point-in-time query support.
//!
//! Provides SQLite-backed, append-only persistence for version snapshots.
//! Creating a version also appends its id to the owning record's history
//! index, in the same transaction and as an in-place update of that row.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{ChronicleError, ChronicleResult};
use crate::versioning::{NewVersion, TargetRef, Version, VersionSummary};

/// Trait for version storage operations
pub trait VersionStore: Send + Sync {
    /// Store a new version and append it to the target's history index.
    ///
    /// Fails with a validation error when the version has no target id or
    /// the target cannot be resolved.
    fn create(&self, version: NewVersion) -> ChronicleResult<Version>;

    /// Same as [`create`](Self::create), but on a connection whose
    /// transaction the caller owns. Nothing is visible until it commits.
    fn create_in(&self, conn: &Connection, version: NewVersion) -> ChronicleResult<Version>;

    /// Get a version by id
    fn find_by_id(&self, id: Uuid) -> ChronicleResult<Option<Version>>;

    /// Get all versions of a target, oldest first
    fn find_by_target(&self, target: &TargetRef) -> ChronicleResult<Vec<Version>>;

    /// Get the newest version created at or before `timestamp`
    fn find_at_time(
        &self,
        target: &TargetRef,
        timestamp: DateTime<Utc>,
    ) -> ChronicleResult<Option<Version>>;

    /// Get version summary for a target
    fn summary(&self, target: &TargetRef) -> ChronicleResult<Option<VersionSummary>>;

    /// Count total versions in store
    fn count_all(&self) -> ChronicleResult<usize>;
}

/// Fixed-width RFC 3339 so that text order is chronological order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> ChronicleResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ChronicleError::parse(e.to_string()))
}

const SELECT_VERSION: &str = r#"SELECT id, target_type, target_id, data, user_id, message, created_at
               FROM versions"#;

/// SQLite-backed version store
pub struct SqliteVersionStore {
    db: Database,
}

impl SqliteVersionStore {
    /// Create a store on a shared database handle
    pub fn new(db: Database) -> ChronicleResult<Self> {
        let store = Self { db };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> ChronicleResult<()> {
        let conn = self.db.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                data TEXT NOT NULL,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            -- History listing and point-in-time queries
            CREATE INDEX IF NOT EXISTS idx_versions_target_time
                ON versions(target_type, target_id, created_at, seq);
        "#,
        )?;
        debug!("version schema ready");
        Ok(())
    }

    fn row_to_version(row: &rusqlite::Row<'_>) -> ChronicleResult<Version> {
        let id: String = row.get(0)?;
        let target_type: String = row.get(1)?;
        let target_id: String = row.get(2)?;
        let data: String = row.get(3)?;
        let user_id: String = row.get(4)?;
        let message: String = row.get(5)?;
        let created_at: String = row.get(6)?;

        Ok(Version {
            id: Some(Uuid::parse_str(&id).map_err(|e| ChronicleError::parse(e.to_string()))?),
            target: TargetRef {
                target_type,
                target_id,
            },
            data: serde_json::from_str(&data)?,
            user_id,
            message,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

impl VersionStore for SqliteVersionStore {
    fn create(&self, version: NewVersion) -> ChronicleResult<Version> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version = self.create_in(&tx, version)?;
        tx.commit()?;
        Ok(version)
    }

    fn create_in(&self, conn: &Connection, version: NewVersion) -> ChronicleResult<Version> {
        let NewVersion {
            target,
            data,
            user_id,
            message,
        } = version;

        if target.target_id.trim().is_empty() {
            return Err(ChronicleError::missing_target(&target.target_type));
        }
        let table = self
            .db
            .resolve_target(&target.target_type)?
            .ok_or_else(|| ChronicleError::unknown_target(&target.target_type, &target.target_id))?;

        let id = Uuid::new_v4();
        let payload = serde_json::to_string(&data)?;

        // Per-target timestamps never go backwards, even if the clock does.
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(created_at) FROM versions WHERE target_type = ?1 AND target_id = ?2",
            params![target.target_type, target.target_id],
            |row| row.get(0),
        )?;
        let mut created_at = parse_timestamp(&format_timestamp(Utc::now()))?;
        if let Some(latest) = latest {
            let latest = parse_timestamp(&latest)?;
            if latest > created_at {
                created_at = latest;
            }
        }

        conn.execute(
            r#"INSERT INTO versions
               (id, target_type, target_id, data, user_id, message, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                id.to_string(),
                target.target_type,
                target.target_id,
                payload,
                user_id,
                message,
                format_timestamp(created_at),
            ],
        )?;

        let updated = conn.execute(
            &format!(
                "UPDATE {} SET versions_count = versions_count + 1, \
                 version_ids = json_insert(version_ids, '$[#]', ?1) WHERE id = ?2",
                table
            ),
            params![id.to_string(), target.target_id],
        )?;
        if updated == 0 {
            return Err(ChronicleError::unknown_target(
                &target.target_type,
                &target.target_id,
            ));
        }

        debug!(
            version_id = %id,
            target_type = %target.target_type,
            target_id = %target.target_id,
            "created version"
        );

        Ok(Version {
            id: Some(id),
            target,
            data,
            user_id,
            message,
            created_at,
        })
    }

    fn find_by_id(&self, id: Uuid) -> ChronicleResult<Option<Version>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_VERSION))?;

        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_version(row)))
            .optional()?
            .transpose()
    }

    fn find_by_target(&self, target: &TargetRef) -> ChronicleResult<Vec<Version>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE target_type = ?1 AND target_id = ?2 ORDER BY created_at ASC, seq ASC",
            SELECT_VERSION
        ))?;

        let results = stmt.query_map(params![target.target_type, target.target_id], |row| {
            Ok(Self::row_to_version(row))
        })?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn find_at_time(
        &self,
        target: &TargetRef,
        timestamp: DateTime<Utc>,
    ) -> ChronicleResult<Option<Version>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE target_type = ?1 AND target_id = ?2 AND created_at <= ?3 \
             ORDER BY created_at DESC, seq DESC LIMIT 1",
            SELECT_VERSION
        ))?;

        stmt.query_row(
            params![
                target.target_type,
                target.target_id,
                format_timestamp(timestamp)
            ],
            |row| Ok(Self::row_to_version(row)),
        )
        .optional()?
        .transpose()
    }

    fn summary(&self, target: &TargetRef) -> ChronicleResult<Option<VersionSummary>> {
        let conn = self.db.conn()?;

        let (total, first, last): (u32, Option<String>, Option<String>) = conn.query_row(
            r#"SELECT COUNT(*), MIN(created_at), MAX(created_at)
               FROM versions
               WHERE target_type = ?1 AND target_id = ?2"#,
            params![target.target_type, target.target_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let (Some(first), Some(last)) = (first, last) else {
            return Ok(None);
        };
        if total == 0 {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            r#"SELECT user_id FROM versions
               WHERE target_type = ?1 AND target_id = ?2
               GROUP BY user_id
               ORDER BY MIN(seq)"#,
        )?;
        let authors = stmt
            .query_map(params![target.target_type, target.target_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(Some(VersionSummary {
            target: target.clone(),
            total_versions: total,
            first_created: parse_timestamp(&first)?,
            last_created: parse_timestamp(&last)?,
            authors,
        }))
    }

    fn count_all(&self) -> ChronicleResult<usize> {
        let conn = self.db.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM versions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::create_record_table;
    use crate::versioning::VersionData;
    use serde_json::json;

    fn setup() -> (Database, SqliteVersionStore) {
        let db = Database::in_memory().unwrap();
        {
            let conn = db.conn().unwrap();
            create_record_table(&conn, "questions").unwrap();
            conn.execute(
                "INSERT INTO questions (id, body) VALUES ('q-1', '{}')",
                [],
            )
            .unwrap();
        }
        db.register_target("question", "questions").unwrap();
        let store = SqliteVersionStore::new(db.clone()).unwrap();
        (db, store)
    }

    fn data(title: &str) -> VersionData {
        let mut data = VersionData::new();
        data.insert("title".to_string(), json!(title));
        data
    }

    fn index_of(db: &Database, id: &str) -> (u32, Vec<String>) {
        let conn = db.conn().unwrap();
        let (count, ids): (u32, String) = conn
            .query_row(
                "SELECT versions_count, version_ids FROM questions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        (count, serde_json::from_str(&ids).unwrap())
    }

    #[test]
    fn test_create_appends_to_index() {
        let (db, store) = setup();
        let target = TargetRef::new("question", "q-1");

        let v1 = store
            .create(NewVersion::new(target.clone(), data("first"), "alice").with_message("init"))
            .unwrap();
        let v2 = store
            .create(NewVersion::new(target.clone(), data("second"), "bob"))
            .unwrap();

        let (count, ids) = index_of(&db, "q-1");
        assert_eq!(count, 2);
        assert_eq!(
            ids,
            vec![v1.id.unwrap().to_string(), v2.id.unwrap().to_string()]
        );
        assert!(v2.created_at >= v1.created_at);
        assert_eq!(v1.message, "init");
    }

    #[test]
    fn test_create_without_target_id_fails() {
        let (db, store) = setup();
        let err = store
            .create(NewVersion::new(TargetRef::new("question", ""), data("x"), "alice"))
            .unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::ValMissingTarget);
        assert_eq!(store.count_all().unwrap(), 0);
        assert_eq!(index_of(&db, "q-1").0, 0);
    }

    #[test]
    fn test_create_for_unregistered_type_fails() {
        let (_db, store) = setup();
        let err = store
            .create(NewVersion::new(TargetRef::new("answer", "a-1"), data("x"), "alice"))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ValUnknownTarget);
    }

    #[test]
    fn test_create_for_missing_row_rolls_back() {
        let (_db, store) = setup();
        let err = store
            .create(NewVersion::new(TargetRef::new("question", "q-404"), data("x"), "alice"))
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.count_all().unwrap(), 0);
    }

    #[test]
    fn test_create_in_is_discarded_without_commit() {
        let (db, store) = setup();
        {
            let mut conn = db.conn().unwrap();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();
            store
                .create_in(&tx, NewVersion::new(TargetRef::new("question", "q-1"), data("x"), "alice"))
                .unwrap();
            assert_eq!(
                tx.query_row("SELECT versions_count FROM questions WHERE id = 'q-1'", [], |row| {
                    row.get::<_, u32>(0)
                })
                .unwrap(),
                1
            );
        }

        assert_eq!(store.count_all().unwrap(), 0);
        assert_eq!(index_of(&db, "q-1"), (0, Vec::new()));
    }

    #[test]
    fn test_find_by_id_and_target() {
        let (_db, store) = setup();
        let target = TargetRef::new("question", "q-1");

        let v1 = store
            .create(NewVersion::new(target.clone(), data("one"), "alice"))
            .unwrap();
        store
            .create(NewVersion::new(target.clone(), data("two"), "alice"))
            .unwrap();

        let found = store.find_by_id(v1.id.unwrap()).unwrap().unwrap();
        assert_eq!(found, v1);
        assert!(store.find_by_id(Uuid::new_v4()).unwrap().is_none());

        let all = store.find_by_target(&target).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content("title"), "one");
        assert_eq!(all[1].content("title"), "two");

        let other = store
            .find_by_target(&TargetRef::new("question", "q-2"))
            .unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_point_in_time_query() {
        let (_db, store) = setup();
        let target = TargetRef::new("question", "q-1");

        let before = Utc::now() - chrono::Duration::hours(1);
        assert!(store.find_at_time(&target, before).unwrap().is_none());

        store
            .create(NewVersion::new(target.clone(), data("one"), "alice"))
            .unwrap();
        let v2 = store
            .create(NewVersion::new(target.clone(), data("two"), "alice"))
            .unwrap();

        let now = store.find_at_time(&target, Utc::now()).unwrap().unwrap();
        assert_eq!(now.id, v2.id);
    }

    #[test]
    fn test_summary() {
        let (_db, store) = setup();
        let target = TargetRef::new("question", "q-1");
        assert!(store.summary(&target).unwrap().is_none());

        for user in ["alice", "bob", "alice"] {
            store
                .create(NewVersion::new(target.clone(), data(user), user))
                .unwrap();
        }

        let summary = store.summary(&target).unwrap().unwrap();
        assert_eq!(summary.total_versions, 3);
        assert_eq!(summary.authors, vec!["alice".to_string(), "bob".to_string()]);
        assert!(summary.last_created >= summary.first_created);
    }
}
