//! Integration tests for file-backed storage.
//!
//! Covers reopening a database from configuration, concurrent writers
//! appending versions to the same record, and saves that fail midway.

mod common;

use chronicle_core::{
    ChronicleConfig, ChronicleError, ChronicleResult, Database, ErrorCode, NewVersion, Position,
    RecordStore, SqliteRecordStore, SqliteVersionStore, TargetRef, VersionData, VersionIndex,
    VersionStore, Versioning,
};
use common::{create_question, init_tracing, question_fields, Question};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Record store whose next update fails after the row would have been written.
struct FailingUpdates {
    inner: SqliteRecordStore<Question>,
    fail_next: AtomicBool,
}

impl RecordStore<Question> for FailingUpdates {
    fn insert(&self, conn: &Connection, record: &Question) -> ChronicleResult<()> {
        self.inner.insert(conn, record)
    }

    fn update(&self, conn: &Connection, record: &Question) -> ChronicleResult<()> {
        self.inner.update(conn, record)?;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ChronicleError::Internal("disk full".to_string()));
        }
        Ok(())
    }

    fn find(&self, conn: &Connection, id: &str) -> ChronicleResult<Option<Question>> {
        self.inner.find(conn, id)
    }

    fn version_index(&self, conn: &Connection, id: &str) -> ChronicleResult<Option<VersionIndex>> {
        self.inner.version_index(conn, id)
    }
}

fn open(dir: &TempDir) -> Database {
    Database::open_path(dir.path().join("chronicle.db"), Duration::from_secs(10)).unwrap()
}

/// Writers on separate connections never lose an index entry.
#[test]
fn test_concurrent_writers_keep_index_consistent() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let db_a = open(&dir);
    let db_b = open(&dir);
    let questions = Versioning::sqlite(&db_a, "questions", question_fields()).unwrap();
    Versioning::<Question>::sqlite(&db_b, "questions", question_fields()).unwrap();
    create_question(&questions, "q-1", "busy", "body");

    let stores = [
        SqliteVersionStore::new(db_a.clone()).unwrap(),
        SqliteVersionStore::new(db_b.clone()).unwrap(),
    ];
    let target = TargetRef::new("question", "q-1");

    const THREADS: usize = 4;
    const PER_THREAD: usize = 10;

    let created: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = &stores[t % stores.len()];
                let target = target.clone();
                s.spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            let mut data = VersionData::new();
                            data.insert("title".to_string(), json!(format!("{}-{}", t, i)));
                            store
                                .create(NewVersion::new(target.clone(), data, "writer"))
                                .unwrap()
                                .id
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let doc = questions.find("q-1").unwrap().unwrap();
    let index = &doc.history;
    assert_eq!(index.versions_count as usize, THREADS * PER_THREAD);
    assert_eq!(index.version_ids.len(), THREADS * PER_THREAD);

    let stored: HashSet<_> = index.version_ids.iter().copied().collect();
    let expected: HashSet<_> = created.into_iter().collect();
    assert_eq!(stored, expected);

    let listed = questions.versions(&doc).to_vec().unwrap();
    assert_eq!(listed.len(), THREADS * PER_THREAD);
    assert!(listed.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

/// History survives closing and reopening the database.
#[test]
fn test_reopen_from_config() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = ChronicleConfig::builder()
        .database_path(dir.path().join("nested").join("chronicle.db"))
        .busy_timeout_ms(2_000)
        .skip_unchanged_saves(true)
        .build();

    {
        let db = Database::open(&config).unwrap();
        let questions = Versioning::sqlite(&db, "questions", question_fields()).unwrap();
        assert!(questions.config().skip_unchanged_saves);
        let mut doc = create_question(&questions, "q-1", "draft", "body");

        // Unchanged save is skipped under this policy.
        assert!(questions.save(&mut doc).unwrap().is_none());

        doc.title = "published".to_string();
        doc.set_version_message("publish");
        assert!(questions.save(&mut doc).unwrap().is_some());
    }

    let db = Database::open(&config).unwrap();
    let questions = Versioning::sqlite(&db, "questions", question_fields()).unwrap();
    let doc = questions.find("q-1").unwrap().unwrap();

    assert_eq!(doc.title, "published");
    assert_eq!(doc.history.versions_count, 1);
    let first = questions.version_at(&doc, Position::First).unwrap().unwrap();
    assert_eq!(first.content("title"), "draft");
    assert_eq!(first.message, "publish");
}

/// Versions must name a registered target that exists.
#[test]
fn test_version_target_validation() {
    init_tracing();
    let db = Database::in_memory().unwrap();
    let questions = Versioning::sqlite(&db, "questions", question_fields()).unwrap();
    create_question(&questions, "q-1", "title", "body");
    let store = SqliteVersionStore::new(db.clone()).unwrap();

    let mut data = VersionData::new();
    data.insert("title".to_string(), json!("x"));

    let err = store
        .create(NewVersion::new(TargetRef::new("question", ""), data.clone(), "u"))
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.code(), ErrorCode::ValMissingTarget);

    let err = store
        .create(NewVersion::new(TargetRef::new("answer", "a-1"), data.clone(), "u"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValUnknownTarget);

    let err = store
        .create(NewVersion::new(TargetRef::new("question", "q-404"), data.clone(), "u"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValUnknownTarget);

    // Failed creates leave nothing behind.
    assert_eq!(store.count_all().unwrap(), 0);

    assert!(db.deregister_target("question").unwrap());
    let err = store
        .create(NewVersion::new(TargetRef::new("question", "q-1"), data, "u"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValUnknownTarget);
}

/// A save that fails leaves neither a version nor an index entry behind.
#[test]
fn test_failed_save_records_nothing() {
    init_tracing();
    let db = Database::in_memory().unwrap();
    let records = Arc::new(FailingUpdates {
        inner: SqliteRecordStore::new(&db, "questions").unwrap(),
        fail_next: AtomicBool::new(false),
    });
    let versions = Arc::new(SqliteVersionStore::new(db.clone()).unwrap());
    let questions = Versioning::new(db.clone(), question_fields(), records.clone(), versions.clone());

    let mut doc = create_question(&questions, "q-1", "t0", "body");
    doc.title = "t1".to_string();
    records.fail_next.store(true, Ordering::SeqCst);

    assert!(questions.save(&mut doc).is_err());
    assert_eq!(doc.title, "t1");
    assert_eq!(doc.history.versions_count, 0);
    assert!(doc.baseline().is_some_and(|b| b.title == "t0"));

    let stored = questions.find("q-1").unwrap().unwrap();
    assert_eq!(stored.title, "t0");
    assert_eq!(stored.history.versions_count, 0);
    assert_eq!(versions.count_all().unwrap(), 0);

    // Retrying records the change exactly once.
    let version = questions.save(&mut doc).unwrap().unwrap();
    assert_eq!(version.content("title"), "t0");
    assert_eq!(doc.history.versions_count, 1);

    let titles: Vec<_> = questions
        .versions(&doc)
        .iter()
        .unwrap()
        .map(|v| v.content("title"))
        .collect();
    assert_eq!(titles, vec!["t0"]);
    assert_eq!(questions.find("q-1").unwrap().unwrap().title, "t1");
}
