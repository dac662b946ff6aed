//! API Models
//!
//! Response bodies for the REST API, documented with `utoipa`.

use serde::{Deserialize, Serialize};
use tutor_core::content::TopicRecord;
use utoipa::ToSchema;

/// A topic from the tutoring catalog.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct Topic {
    #[schema(example = "photosynthesis")]
    pub id: String,
    #[schema(example = "Photosynthesis")]
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teaching_prompt: Option<String>,
}

impl From<&TopicRecord> for Topic {
    fn from(record: &TopicRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            summary: record.summary.clone(),
            sample_question: record.sample_question.clone(),
            teaching_prompt: record.teaching_prompt.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
