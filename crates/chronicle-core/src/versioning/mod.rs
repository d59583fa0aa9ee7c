//! Record versioning: snapshots, history addressing, diff and rollback.
//!
//! Each save of a persisted record captures the prior state of its tracked
//! fields as an immutable version. History can then be listed, addressed by
//! position, compared field by field, or written back onto the record.

mod fields;
mod manager;
mod position;
pub(crate) mod store;
mod tracked;
mod version;

pub use fields::{FieldAccessor, TrackedFields, TrackedFieldsBuilder};
pub use manager::{FieldDiff, VersionHistory, Versioning};
pub use position::Position;
pub use store::{SqliteVersionStore, VersionStore};
pub use tracked::{FieldChange, PendingMutation, Tracked};
pub use version::{NewVersion, TargetRef, Version, VersionData, VersionIndex, VersionSummary};
