//! Record persistence.

use rusqlite::{params, Connection, OptionalExtension};
use std::marker::PhantomData;
use tracing::debug;
use uuid::Uuid;

use crate::db::{check_table_name, Database};
use crate::error::{ChronicleError, ChronicleResult};
use crate::records::Versionable;
use crate::versioning::VersionIndex;

/// Trait for host record storage operations.
///
/// Every method runs on the connection it is given, so that a record write
/// and the version it produces can share one transaction.
pub trait RecordStore<R: Versionable>: Send + Sync {
    /// Persist a record for the first time
    fn insert(&self, conn: &Connection, record: &R) -> ChronicleResult<()>;

    /// Persist changes to an existing record.
    ///
    /// Never writes the history index; that is owned by the version store.
    fn update(&self, conn: &Connection, record: &R) -> ChronicleResult<()>;

    /// Load a record with its current history index
    fn find(&self, conn: &Connection, id: &str) -> ChronicleResult<Option<R>>;

    /// Read only the history index of a record
    fn version_index(&self, conn: &Connection, id: &str) -> ChronicleResult<Option<VersionIndex>>;
}

/// Create a record table with history index columns.
pub(crate) fn create_record_table(conn: &Connection, table: &str) -> ChronicleResult<()> {
    check_table_name(table)?;
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            versions_count INTEGER NOT NULL DEFAULT 0,
            version_ids TEXT NOT NULL DEFAULT '[]'
        );
        "#,
        table = table
    ))?;
    Ok(())
}

fn parse_index(count: u32, ids: &str) -> ChronicleResult<VersionIndex> {
    let version_ids: Vec<Uuid> = serde_json::from_str(ids)?;
    Ok(VersionIndex {
        versions_count: count,
        version_ids,
    })
}

/// SQLite-backed record store, one table per record type.
///
/// Records are stored as JSON documents next to the history index columns.
/// Creating the store registers the record type with the database so that
/// versions can find their way back to it.
pub struct SqliteRecordStore<R> {
    table: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Versionable> SqliteRecordStore<R> {
    /// Create the table if needed and register `R::TARGET_TYPE` against it.
    pub fn new(db: &Database, table: impl Into<String>) -> ChronicleResult<Self> {
        let table = table.into();
        {
            let conn = db.conn()?;
            create_record_table(&conn, &table)?;
        }
        db.register_target(R::TARGET_TYPE, table.as_str())?;
        debug!(target_type = R::TARGET_TYPE, %table, "record store ready");

        Ok(Self {
            table,
            _marker: PhantomData,
        })
    }

    /// Table holding the records.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl<R: Versionable> RecordStore<R> for SqliteRecordStore<R> {
    fn insert(&self, conn: &Connection, record: &R) -> ChronicleResult<()> {
        if record.id().trim().is_empty() {
            return Err(ChronicleError::validation(format!(
                "{} record has no id",
                R::TARGET_TYPE
            )));
        }
        let body = serde_json::to_string(record)?;

        let result = conn.execute(
            &format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", self.table),
            params![record.id(), body],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(ChronicleError::duplicate(record.id()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update(&self, conn: &Connection, record: &R) -> ChronicleResult<()> {
        let body = serde_json::to_string(record)?;

        let updated = conn.execute(
            &format!("UPDATE {} SET body = ?1 WHERE id = ?2", self.table),
            params![body, record.id()],
        )?;
        if updated == 0 {
            return Err(ChronicleError::not_found(record.id()));
        }
        Ok(())
    }

    fn find(&self, conn: &Connection, id: &str) -> ChronicleResult<Option<R>> {
        let row: Option<(String, u32, String)> = conn
            .query_row(
                &format!(
                    "SELECT body, versions_count, version_ids FROM {} WHERE id = ?1",
                    self.table
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((body, count, ids)) = row else {
            return Ok(None);
        };
        let mut record: R = serde_json::from_str(&body)?;
        *record.version_index_mut() = parse_index(count, &ids)?;
        Ok(Some(record))
    }

    fn version_index(&self, conn: &Connection, id: &str) -> ChronicleResult<Option<VersionIndex>> {
        let row: Option<(u32, String)> = conn
            .query_row(
                &format!(
                    "SELECT versions_count, version_ids FROM {} WHERE id = ?1",
                    self.table
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(count, ids)| parse_index(count, &ids)).transpose()
    }
}
