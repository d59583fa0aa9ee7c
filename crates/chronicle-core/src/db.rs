//! Shared SQLite handle and the target-type registry.
//!
//! Record stores and the version store share one [`Database`]. The registry
//! maps a record type's discriminator (`target_type`) to the table its rows
//! live in, which is how a version's polymorphic target reference is resolved
//! back to the record it belongs to.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ChronicleConfig, VersioningConfig};
use crate::error::{ChronicleError, ChronicleResult};

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid table name regex"));

/// Validate a table name before it is interpolated into SQL.
pub(crate) fn check_table_name(table: &str) -> ChronicleResult<()> {
    if TABLE_NAME.is_match(table) {
        Ok(())
    } else {
        Err(ChronicleError::validation(format!(
            "'{}' is not a valid table name",
            table
        )))
    }
}

/// Cloneable handle to the database and its target registry.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    targets: Arc<RwLock<HashMap<String, String>>>,
    versioning: VersioningConfig,
}

impl Database {
    /// Open the database described by `config`.
    ///
    /// The handle carries `config.versioning`, which versioning attached
    /// through it starts from.
    pub fn open(config: &ChronicleConfig) -> ChronicleResult<Self> {
        let db = Self::open_path(
            &config.database_path,
            Duration::from_millis(config.busy_timeout_ms),
        )?;
        Ok(db.with_versioning(config.versioning.clone()))
    }

    /// Open (or create) a database file.
    pub fn open_path(path: impl AsRef<Path>, busy_timeout: Duration) -> ChronicleResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        info!(path = %path.as_ref().display(), "opened chronicle database");
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> ChronicleResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            targets: Arc::new(RwLock::new(HashMap::new())),
            versioning: VersioningConfig::default(),
        }
    }

    /// Replace the default versioning policy for this handle.
    pub fn with_versioning(mut self, config: VersioningConfig) -> Self {
        self.versioning = config;
        self
    }

    /// Versioning policy new [`Versioning`](crate::Versioning) instances start from.
    pub fn versioning_config(&self) -> &VersioningConfig {
        &self.versioning
    }

    /// Lock the connection.
    pub(crate) fn conn(&self) -> ChronicleResult<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }

    /// Register the table backing a record type.
    ///
    /// Re-registering the same pair is a no-op; mapping a type to a second
    /// table is rejected.
    pub fn register_target(
        &self,
        target_type: impl Into<String>,
        table: impl Into<String>,
    ) -> ChronicleResult<()> {
        let target_type = target_type.into();
        let table = table.into();
        check_table_name(&table)?;

        let mut targets = self.targets.write()?;
        match targets.get(&target_type) {
            Some(existing) if *existing == table => Ok(()),
            Some(existing) => Err(ChronicleError::Configuration(format!(
                "target type '{}' is already registered to table '{}'",
                target_type, existing
            ))),
            None => {
                debug!(%target_type, %table, "registered version target");
                targets.insert(target_type, table);
                Ok(())
            }
        }
    }

    /// Remove a record type from the registry. Returns whether it was present.
    pub fn deregister_target(&self, target_type: &str) -> ChronicleResult<bool> {
        let removed = self.targets.write()?.remove(target_type).is_some();
        if removed {
            debug!(%target_type, "deregistered version target");
        }
        Ok(removed)
    }

    /// Table backing `target_type`, if registered.
    pub fn resolve_target(&self, target_type: &str) -> ChronicleResult<Option<String>> {
        Ok(self.targets.read()?.get(target_type).cloned())
    }

    /// Registered target types.
    pub fn target_types(&self) -> ChronicleResult<Vec<String>> {
        let mut types: Vec<String> = self.targets.read()?.keys().cloned().collect();
        types.sort();
        Ok(types)
    }
}
