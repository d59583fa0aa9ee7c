//! Version types: immutable snapshots of a record's tracked fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Snapshot payload: tracked field name to value.
pub type VersionData = BTreeMap<String, serde_json::Value>;

/// Polymorphic reference from a version to the record it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    /// Record type discriminator, resolved through the database registry.
    pub target_type: String,
    /// Id of the record within its type.
    pub target_id: String,
}

impl TargetRef {
    pub fn new(target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            target_id: target_id.into(),
        }
    }
}

/// The lightweight history index carried on every versioned record.
///
/// Maintained by the version store through in-place updates; host code
/// reads it but never writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIndex {
    pub versions_count: u32,
    pub version_ids: Vec<Uuid>,
}

impl VersionIndex {
    /// Resolve a sequence index, counting from the end when negative.
    pub fn id_at(&self, index: i64) -> Option<Uuid> {
        let len = self.version_ids.len() as i64;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return None;
        }
        self.version_ids.get(idx as usize).copied()
    }

    pub fn first(&self) -> Option<Uuid> {
        self.version_ids.first().copied()
    }

    pub fn last(&self) -> Option<Uuid> {
        self.version_ids.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.version_ids.is_empty()
    }
}

/// A version about to be written. The store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersion {
    pub target: TargetRef,
    pub data: VersionData,
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

impl NewVersion {
    pub fn new(target: TargetRef, data: VersionData, user_id: impl Into<String>) -> Self {
        Self {
            target,
            data,
            user_id: user_id.into(),
            message: String::new(),
        }
    }

    /// Builder: set the human annotation.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// An immutable snapshot of a record's tracked fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Store-assigned id. `None` only for the synthetic current version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub target: TargetRef,
    pub data: VersionData,
    /// Actor the change that followed this snapshot is attributed to.
    pub user_id: String,
    #[serde(default)]
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Version {
    /// Whether this is the unpersisted view of the live record.
    pub fn is_current(&self) -> bool {
        self.id.is_none()
    }

    /// Field content as a single string.
    ///
    /// Arrays are joined with a space, missing and null values read as empty.
    pub fn content(&self, field: &str) -> String {
        match self.data.get(field) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Some(other) => other.to_string(),
        }
    }
}

/// Summary of the history of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
    pub target: TargetRef,
    pub total_versions: u32,
    pub first_created: DateTime<Utc>,
    pub last_created: DateTime<Utc>,
    /// Distinct actors, in order of first appearance.
    pub authors: Vec<String>,
}
