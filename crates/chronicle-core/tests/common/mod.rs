//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use chronicle_core::{
    Database, Tracked, TrackedFields, Versionable, VersionIndex, Versioning,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; `RUST_LOG=chronicle_core=debug` shows the trace.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub history: VersionIndex,
}

impl Question {
    pub fn new(id: &str, title: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            tags: Vec::new(),
            updated_by: Some("alice".to_string()),
            updated_at: None,
            history: VersionIndex::default(),
        }
    }
}

impl Versionable for Question {
    const TARGET_TYPE: &'static str = "question";

    fn id(&self) -> &str {
        &self.id
    }

    fn actor(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    fn set_actor(&mut self, actor: Option<String>) {
        self.updated_by = actor;
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

pub fn question_fields() -> TrackedFields<Question> {
    TrackedFields::<Question>::builder()
        .field("title", |q| &q.title, |q| &mut q.title)
        .field("body", |q| &q.body, |q| &mut q.body)
        .field("tags", |q| &q.tags, |q| &mut q.tags)
        .build()
        .unwrap()
}

pub fn setup() -> (Database, Versioning<Question>) {
    init_tracing();
    let db = Database::in_memory().unwrap();
    let questions = Versioning::sqlite(&db, "questions", question_fields()).unwrap();
    (db, questions)
}

/// Create and persist a question; the first save records no version.
pub fn create_question(
    questions: &Versioning<Question>,
    id: &str,
    title: &str,
    body: &str,
) -> Tracked<Question> {
    let mut doc = Tracked::new(Question::new(id, title, body));
    assert!(questions.save(&mut doc).unwrap().is_none());
    doc
}
