//! chronicle-core - Core library for chronicle.
//!
//! This crate attaches version tracking to mutable records: every save of a
//! persisted record snapshots the prior state of its tracked fields, and the
//! resulting history can be listed, diffed word by word, previewed, or rolled
//! back onto the record.
//!
//! # Example
//!
//! ```ignore
//! use chronicle_core::{Database, Position, Tracked, TrackedFields, Versioning};
//!
//! let db = Database::in_memory()?;
//! let fields = TrackedFields::<Question>::builder()
//!     .field("title", |q| &q.title, |q| &mut q.title)
//!     .field("body", |q| &q.body, |q| &mut q.body)
//!     .build()?;
//! let questions = Versioning::sqlite(&db, "questions", fields)?;
//!
//! let mut doc = Tracked::new(question);
//! questions.save(&mut doc)?;
//!
//! doc.title = "A better title".to_string();
//! questions.save(&mut doc)?;
//!
//! let diff = questions.diff(&doc, "title", Position::First, Position::Current, None)?;
//! questions.rollback(&mut doc, None)?;
//! ```

pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod records;
pub mod versioning;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{ChronicleConfig, VersioningConfig};
pub use db::Database;
pub use diff::{diff_words, DiffFormat, WordDiff};
pub use error::{ChronicleError, ChronicleResult, ErrorCode};
pub use records::{RecordStore, SqliteRecordStore, Versionable};
pub use versioning::{
    FieldDiff, NewVersion, PendingMutation, Position, SqliteVersionStore, TargetRef, Tracked,
    TrackedFields, Version, VersionData, VersionHistory, VersionIndex, VersionStore,
    VersionSummary, Versioning,
};
