//! Host records: the mutable entities versioning attaches to.
//!
//! A record type opts in by implementing [`Versionable`], which exposes the
//! bookkeeping attributes the versioning layer needs (id, acting user, update
//! timestamp and the history index). Persistence goes through a
//! [`RecordStore`].

mod store;

pub use store::{RecordStore, SqliteRecordStore};
#[cfg(test)]
pub(crate) use store::create_record_table;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::versioning::VersionIndex;

/// A record type with version tracking attached.
pub trait Versionable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Discriminator stored on every version of this type.
    const TARGET_TYPE: &'static str;

    /// Stable id of the record. Assigned by the host before the first save.
    fn id(&self) -> &str;

    /// Who last modified the record.
    fn actor(&self) -> Option<&str>;

    fn set_actor(&mut self, actor: Option<String>);

    /// When the record was last modified.
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// History index, maintained by the version store.
    fn version_index(&self) -> &VersionIndex;

    fn version_index_mut(&mut self) -> &mut VersionIndex;
}
