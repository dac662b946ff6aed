use crate::content::{ContentStore, TopicRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The tutoring interaction style. It decides which tool outputs are relevant
/// and which synthesis voice is used.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Learn,
    Quiz,
    TeachBack,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Learn, Mode::Quiz, Mode::TeachBack];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Learn => "learn",
            Mode::Quiz => "quiz",
            Mode::TeachBack => "teach_back",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid mode: '{0}'")]
pub struct InvalidMode(pub String);

impl FromStr for Mode {
    type Err = InvalidMode;

    /// Accepts exactly `learn`, `quiz` or `teach_back`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "learn" => Ok(Mode::Learn),
            "quiz" => Ok(Mode::Quiz),
            "teach_back" => Ok(Mode::TeachBack),
            _ => Err(InvalidMode(s.to_string())),
        }
    }
}

/// One tool invocation as seen by the tutor.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct Interaction {
    pub tool: String,
    pub argument: Option<String>,
    pub result: String,
    pub mode: Mode,
}

/// Per-session tutor state.
///
/// `current_topic_id` is a normalized key into the `ContentStore`, only ever
/// assigned after a successful lookup. `history` is append-only.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct TutorState {
    pub mode: Mode,
    pub current_topic_id: Option<String>,
    pub history: Vec<Interaction>,
}

impl TutorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the selected topic. Returns `None` when nothing is selected or
    /// the key no longer resolves.
    pub fn current_topic<'a>(&self, content: &'a ContentStore) -> Option<&'a TopicRecord> {
        self.current_topic_id
            .as_deref()
            .and_then(|id| content.find(id))
    }

    pub fn record(&mut self, tool: &str, argument: Option<&str>, result: &str) {
        self.history.push(Interaction {
            tool: tool.to_string(),
            argument: argument.map(str::to_string),
            result: result.to_string(),
            mode: self.mode,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContentStore {
        ContentStore::from_json_str(
            r#"[{"id": "loops", "title": "Loops", "summary": "Loops repeat code blocks"}]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let state = TutorState::new();
        assert_eq!(state.mode, Mode::Learn);
        assert!(state.current_topic_id.is_none());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("learn".parse::<Mode>(), Ok(Mode::Learn));
        assert_eq!(" QUIZ ".parse::<Mode>(), Ok(Mode::Quiz));
        assert_eq!("Teach_Back".parse::<Mode>(), Ok(Mode::TeachBack));
        assert!("teach-back".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_display_matches_serde() {
        for mode in Mode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }

    #[test]
    fn test_current_topic_resolution() {
        let content = store();
        let mut state = TutorState::new();
        assert!(state.current_topic(&content).is_none());

        state.current_topic_id = Some("loops".to_string());
        assert_eq!(state.current_topic(&content).unwrap().title, "Loops");

        // A dangling key resolves to nothing instead of failing.
        state.current_topic_id = Some("recursion".to_string());
        assert!(state.current_topic(&content).is_none());
    }

    #[test]
    fn test_record_captures_mode() {
        let mut state = TutorState::new();
        state.mode = Mode::Quiz;
        state.record("ask_quiz", None, "What is a loop?");
        state.record("select_topic", Some("loops"), "Selected topic: Loops.");

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].mode, Mode::Quiz);
        assert_eq!(state.history[1].argument.as_deref(), Some("loops"));
    }
}
