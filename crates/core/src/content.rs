//! Course Content Store
//!
//! Tutoring content is a static JSON document: an ordered array of topics.
//! It is loaded exactly once at startup and shared read-only between sessions
//! behind an `Arc`. A missing or malformed document is fatal to startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A single unit of tutoring content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    /// Stable identifier used by `select_topic` (e.g., "loops").
    pub id: String,
    pub title: String,
    pub summary: String,
    /// Question asked in quiz mode.
    #[serde(default)]
    pub sample_question: Option<String>,
    /// Prompt used to start a teach-back round.
    #[serde(default)]
    pub teaching_prompt: Option<String>,
}

impl TopicRecord {
    /// The text a teach-back answer is scored against: title followed by summary.
    pub fn reference_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

/// Errors that prevent the content document from being loaded.
#[derive(Debug, thiserror::Error)]
pub enum ContentLoadError {
    #[error("Failed to read content file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed content document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid content document: {0}")]
    Invalid(String),
}

/// Normalizes a topic identifier for comparison: trimmed and lower-cased.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// The immutable, ordered collection of topics.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    topics: Vec<TopicRecord>,
}

impl ContentStore {
    /// Loads and validates the content document at `path`.
    pub fn load(path: &Path) -> Result<Self, ContentLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ContentLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses a content document from its JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, ContentLoadError> {
        let topics: Vec<TopicRecord> = serde_json::from_str(raw)?;
        Self::from_topics(topics)
    }

    /// Builds a store from already-parsed topics, rejecting blank or duplicate identifiers.
    pub fn from_topics(topics: Vec<TopicRecord>) -> Result<Self, ContentLoadError> {
        let mut seen = HashSet::new();
        for topic in &topics {
            let id = normalize_id(&topic.id);
            if id.is_empty() {
                return Err(ContentLoadError::Invalid(format!(
                    "topic '{}' has a blank id",
                    topic.title
                )));
            }
            if !seen.insert(id) {
                return Err(ContentLoadError::Invalid(format!(
                    "duplicate topic id '{}'",
                    topic.id
                )));
            }
        }
        Ok(Self { topics })
    }

    /// Looks a topic up by identifier. Both sides are normalized before comparing.
    pub fn find(&self, id: &str) -> Option<&TopicRecord> {
        let wanted = normalize_id(id);
        self.topics.iter().find(|t| normalize_id(&t.id) == wanted)
    }

    pub fn topics(&self) -> &[TopicRecord] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Renders the topics as `id (title)` entries joined by `separator`.
    pub fn describe(&self, separator: &str) -> String {
        self.topics
            .iter()
            .map(|t| format!("{} ({})", t.id, t.title))
            .collect::<Vec<_>>()
            .join(separator)
    }
}
