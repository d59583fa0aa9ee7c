//! Fixture record shared by unit tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::Versionable;
use crate::versioning::{TrackedFields, VersionIndex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub author: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub history: VersionIndex,
}

impl Note {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            labels: Vec::new(),
            author: None,
            updated_at: None,
            history: VersionIndex::default(),
        }
    }
}

impl Versionable for Note {
    const TARGET_TYPE: &'static str = "note";

    fn id(&self) -> &str {
        &self.id
    }

    fn actor(&self) -> Option<&str> {
        self.author.as_deref()
    }

    fn set_actor(&mut self, actor: Option<String>) {
        self.author = actor;
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    fn version_index(&self) -> &VersionIndex {
        &self.history
    }

    fn version_index_mut(&mut self) -> &mut VersionIndex {
        &mut self.history
    }
}

pub fn note_fields() -> TrackedFields<Note> {
    TrackedFields::<Note>::builder()
        .field("text", |n| &n.text, |n| &mut n.text)
        .field("labels", |n| &n.labels, |n| &mut n.labels)
        .build()
        .unwrap()
}
