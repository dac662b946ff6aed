//! Tutor Tool Service
//!
//! This module exposes the tutor's operations as MCP (Model Context Protocol)
//! tools. The model driver decides which tool to call based on what the user
//! said; each tool reads or mutates the per-session `TutorState` and answers
//! with a short sentence that is spoken back to the user.
//!
//! Tools never fail. Unknown topics, invalid modes and missing selections are
//! all answered with an explanatory sentence so the session keeps going.

use crate::{
    content::{ContentStore, TopicRecord, normalize_id},
    scoring::score_teachback,
    session::VoiceSession,
    state::{Mode, TutorState},
    voice::voice_for,
};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

const NO_TOPIC_SELECTED: &str = "No topic selected. Use select_topic first.";
const INVALID_MODE: &str = "Invalid mode. Choose learn, quiz, or teach_back.";
const NO_SUMMARY: &str = "No summary available.";
const NO_SAMPLE_QUESTION: &str = "No sample question available.";
const GENERIC_TEACHBACK_PROMPT: &str = "Please explain this topic back to me.";

/// Session-scoped context shared by every tool invocation.
///
/// Pairs the tutor state with a handle to the live voice session so tools can
/// reach back into it (e.g., to switch the synthesis voice).
pub struct Userdata {
    pub tutor_state: TutorState,
    pub session: Option<Arc<dyn VoiceSession>>,
}

impl Userdata {
    pub fn new(session: Option<Arc<dyn VoiceSession>>) -> Self {
        Self {
            tutor_state: TutorState::new(),
            session,
        }
    }
}

// --- Data Structures for Tools ---

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SelectTopicArgs {
    #[schemars(description = "The identifier of the topic to study, as shown by list_topics")]
    pub topic_id: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SetModeArgs {
    #[schemars(description = "The tutoring mode: 'learn', 'quiz', or 'teach_back'")]
    pub mode: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct EvaluateTeachbackArgs {
    #[schemars(description = "The user's own explanation of the selected topic")]
    pub user_answer: String,
}

// --- Service and Handler Implementation ---

/// The tool surface of the tutor.
pub struct TutorService {
    /// Read-only course content shared by all sessions.
    pub content: Arc<ContentStore>,
    /// This session's context.
    pub userdata: Arc<Mutex<Userdata>>,
    /// Optional channel for broadcasting state changes to subscribers.
    pub state_tx: Option<mpsc::Sender<TutorState>>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for TutorService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl TutorService {
    pub fn new(
        content: Arc<ContentStore>,
        userdata: Arc<Mutex<Userdata>>,
        state_tx: Option<mpsc::Sender<TutorState>>,
    ) -> Self {
        Self {
            content,
            userdata,
            state_tx,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List all available tutoring topics with their identifiers and titles.")]
    pub async fn list_topics(&self) -> String {
        info!("Executing tool 'list_topics'");
        let result = self.topics_listing();
        let mut userdata = self.userdata.lock().await;
        userdata.tutor_state.record("list_topics", None, &result);
        result
    }

    #[tool(description = "Select the topic to study by its identifier (e.g. 'loops').")]
    pub async fn select_topic(&self, args: Parameters<SelectTopicArgs>) -> String {
        info!(args = ?args.0, "Executing tool 'select_topic'");
        let requested = &args.0.topic_id;
        let mut userdata = self.userdata.lock().await;

        let result = match self.content.find(requested) {
            Some(topic) => {
                userdata.tutor_state.current_topic_id = Some(normalize_id(requested));
                info!(topic = %topic.id, "Topic selected");
                format!("Selected topic: {}.", topic.title)
            }
            None => format!(
                "Topic '{}' not found. {}",
                requested,
                self.topics_listing()
            ),
        };

        userdata
            .tutor_state
            .record("select_topic", Some(requested), &result);
        self.broadcast(&userdata.tutor_state);
        result
    }

    #[tool(
        description = "Switch the tutoring mode: 'learn' (explanations), 'quiz' (questions), or 'teach_back' (the user explains the topic back)."
    )]
    pub async fn set_mode(&self, args: Parameters<SetModeArgs>) -> String {
        info!(args = ?args.0, "Executing tool 'set_mode'");
        let requested = &args.0.mode;

        let (mode, session) = {
            let mut userdata = self.userdata.lock().await;
            let Ok(mode) = requested.parse::<Mode>() else {
                userdata
                    .tutor_state
                    .record("set_mode", Some(requested), INVALID_MODE);
                return INVALID_MODE.to_string();
            };
            userdata.tutor_state.mode = mode;
            let result = format!("Mode set to {}.", mode);
            userdata
                .tutor_state
                .record("set_mode", Some(requested), &result);
            self.broadcast(&userdata.tutor_state);
            (mode, userdata.session.clone())
        };

        // The voice is advisory: the mode change stands even if this fails.
        if let Some(session) = session {
            let profile = voice_for(mode);
            if let Err(e) = session.update_synthesis(profile).await {
                warn!(%mode, voice = profile.voice, error = ?e, "TTS voice update failed");
            }
        }

        format!("Mode set to {}.", mode)
    }

    #[tool(description = "Explain the currently selected topic.")]
    pub async fn explain_topic(&self) -> String {
        info!("Executing tool 'explain_topic'");
        self.with_topic("explain_topic", |topic| {
            non_blank(Some(&topic.summary))
                .unwrap_or(NO_SUMMARY)
                .to_string()
        })
        .await
    }

    #[tool(description = "Ask the quiz question for the currently selected topic.")]
    pub async fn ask_quiz(&self) -> String {
        info!("Executing tool 'ask_quiz'");
        self.with_topic("ask_quiz", |topic| {
            non_blank(topic.sample_question.as_ref())
                .unwrap_or(NO_SAMPLE_QUESTION)
                .to_string()
        })
        .await
    }

    #[tool(description = "Ask the user to explain the currently selected topic back in their own words.")]
    pub async fn prompt_teachback(&self) -> String {
        info!("Executing tool 'prompt_teachback'");
        self.with_topic("prompt_teachback", |topic| {
            non_blank(topic.teaching_prompt.as_ref())
                .or_else(|| non_blank(topic.sample_question.as_ref()))
                .unwrap_or(GENERIC_TEACHBACK_PROMPT)
                .to_string()
        })
        .await
    }

    #[tool(
        description = "Score the user's teach-back explanation of the selected topic from 1 to 10 and give feedback."
    )]
    pub async fn evaluate_teachback(&self, args: Parameters<EvaluateTeachbackArgs>) -> String {
        info!("Executing tool 'evaluate_teachback'");
        let answer = &args.0.user_answer;
        let mut userdata = self.userdata.lock().await;

        let result = match userdata.tutor_state.current_topic(&self.content) {
            Some(topic) => {
                let score = score_teachback(&topic.reference_text(), answer);
                info!(
                    topic = %topic.id,
                    score = score.score,
                    matched = score.matched,
                    keywords = score.keyword_count,
                    "Teach-back evaluated"
                );
                score.to_string()
            }
            None => NO_TOPIC_SELECTED.to_string(),
        };

        userdata
            .tutor_state
            .record("evaluate_teachback", Some(answer), &result);
        self.broadcast(&userdata.tutor_state);
        result
    }
}

impl TutorService {
    fn topics_listing(&self) -> String {
        if self.content.is_empty() {
            return "No topics are available.".to_string();
        }
        format!("Available topics: {}", self.content.describe("; "))
    }

    /// Runs `f` against the selected topic, or answers with the "no topic" prompt.
    async fn with_topic<F>(&self, tool: &str, f: F) -> String
    where
        F: FnOnce(&TopicRecord) -> String,
    {
        let mut userdata = self.userdata.lock().await;
        let result = match userdata.tutor_state.current_topic(&self.content) {
            Some(topic) => f(topic),
            None => NO_TOPIC_SELECTED.to_string(),
        };
        userdata.tutor_state.record(tool, None, &result);
        result
    }

    /// Never waits on the subscriber; the userdata lock is held by the caller.
    fn broadcast(&self, state: &TutorState) {
        if let Some(tx) = &self.state_tx {
            if let Err(e) = tx.try_send(state.clone()) {
                warn!(error = %e, "Dropping state update");
            }
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockVoiceSession;
    use anyhow::anyhow;

    const CONTENT: &str = r#"[
        {"id": "variables", "title": "Variables", "summary": "Variables store values for later use.",
         "sample_question": "What is a variable?"},
        {"id": "loops", "title": "Loops", "summary": "Loops repeat code blocks"},
        {"id": "functions", "title": "Functions", "summary": "Functions group reusable logic.",
         "sample_question": "Why use a function?",
         "teaching_prompt": "Teach me what a function is."}
    ]"#;

    fn service_with(session: Option<Arc<dyn VoiceSession>>) -> TutorService {
        let content = Arc::new(ContentStore::from_json_str(CONTENT).unwrap());
        TutorService::new(content, Arc::new(Mutex::new(Userdata::new(session))), None)
    }

    fn service() -> TutorService {
        service_with(None)
    }

    async fn state(service: &TutorService) -> TutorState {
        service.userdata.lock().await.tutor_state.clone()
    }

    fn select(id: &str) -> Parameters<SelectTopicArgs> {
        Parameters(SelectTopicArgs {
            topic_id: id.to_string(),
        })
    }

    fn mode(m: &str) -> Parameters<SetModeArgs> {
        Parameters(SetModeArgs {
            mode: m.to_string(),
        })
    }

    fn answer(text: &str) -> Parameters<EvaluateTeachbackArgs> {
        Parameters(EvaluateTeachbackArgs {
            user_answer: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_list_topics_format() {
        let service = service();
        assert_eq!(
            service.list_topics().await,
            "Available topics: variables (Variables); loops (Loops); functions (Functions)"
        );
    }

    #[tokio::test]
    async fn test_select_every_valid_topic() {
        let service = service();
        for topic in service.content.topics().to_vec() {
            let result = service.select_topic(select(&topic.id)).await;
            assert!(result.contains(&topic.title));
            assert_eq!(
                state(&service).await.current_topic_id,
                Some(normalize_id(&topic.id))
            );
        }
    }

    #[tokio::test]
    async fn test_select_unknown_topic_keeps_selection() {
        let service = service();
        service.select_topic(select("loops")).await;

        for unknown in ["recursion", "", "loop", "variables and loops"] {
            let result = service.select_topic(select(unknown)).await;
            assert!(result.contains("not found"), "{result}");
            for topic in service.content.topics() {
                assert!(result.contains(&topic.id));
            }
            assert_eq!(
                state(&service).await.current_topic_id.as_deref(),
                Some("loops")
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_mode_is_rejected() {
        let service = service();
        service.set_mode(mode("quiz")).await;

        for invalid in ["", "teach-back", "exam", "learning"] {
            let result = service.set_mode(mode(invalid)).await;
            assert_eq!(result, "Invalid mode. Choose learn, quiz, or teach_back.");
            assert_eq!(state(&service).await.mode, Mode::Quiz);
        }
    }

    #[tokio::test]
    async fn test_valid_modes_without_session() {
        let service = service();
        for m in Mode::ALL {
            let result = service.set_mode(mode(m.as_str())).await;
            assert_eq!(result, format!("Mode set to {}.", m));
            assert_eq!(state(&service).await.mode, m);
        }
    }

    #[tokio::test]
    async fn test_set_mode_switches_voice() {
        let mut session = MockVoiceSession::new();
        session
            .expect_update_synthesis()
            .withf(|profile| *profile == voice_for(Mode::TeachBack))
            .times(1)
            .returning(|_| Ok(()));
        let service = service_with(Some(Arc::new(session)));

        let result = service.set_mode(mode(" Teach_Back ")).await;
        assert_eq!(result, "Mode set to teach_back.");
        assert_eq!(state(&service).await.mode, Mode::TeachBack);
    }

    #[tokio::test]
    async fn test_set_mode_survives_voice_failure() {
        let mut session = MockVoiceSession::new();
        session
            .expect_update_synthesis()
            .times(3)
            .returning(|_| Err(anyhow!("synthesis provider unavailable")));
        let service = service_with(Some(Arc::new(session)));

        for m in Mode::ALL {
            let result = service.set_mode(mode(m.as_str())).await;
            assert_eq!(result, format!("Mode set to {}.", m));
            assert_eq!(state(&service).await.mode, m);
        }
    }

    #[tokio::test]
    async fn test_invalid_mode_does_not_touch_voice() {
        let mut session = MockVoiceSession::new();
        session.expect_update_synthesis().times(0);
        let service = service_with(Some(Arc::new(session)));
        service.set_mode(mode("karaoke")).await;
        assert_eq!(state(&service).await.mode, Mode::Learn);
    }

    #[tokio::test]
    async fn test_loops_scenario() {
        let service = service();

        let selected = service.select_topic(select("LOOPS ")).await;
        assert!(selected.contains("Loops"));
        assert_eq!(
            state(&service).await.current_topic_id.as_deref(),
            Some("loops")
        );

        assert_eq!(service.explain_topic().await, "Loops repeat code blocks");
        assert_eq!(service.set_mode(mode("quiz")).await, "Mode set to quiz.");
        assert_eq!(service.ask_quiz().await, "No sample question available.");
        assert_eq!(
            service.prompt_teachback().await,
            "Please explain this topic back to me."
        );
    }

    #[tokio::test]
    async fn test_tools_require_a_topic() {
        let service = service();
        assert_eq!(
            service.explain_topic().await,
            "No topic selected. Use select_topic first."
        );
        assert_eq!(service.ask_quiz().await, NO_TOPIC_SELECTED);
        assert_eq!(service.prompt_teachback().await, NO_TOPIC_SELECTED);
        assert_eq!(
            service.evaluate_teachback(answer("anything")).await,
            NO_TOPIC_SELECTED
        );
    }

    #[tokio::test]
    async fn test_prompt_teachback_fallbacks() {
        let service = service();

        service.select_topic(select("functions")).await;
        assert_eq!(
            service.prompt_teachback().await,
            "Teach me what a function is."
        );

        service.select_topic(select("variables")).await;
        assert_eq!(service.prompt_teachback().await, "What is a variable?");
        assert_eq!(service.ask_quiz().await, "What is a variable?");
    }

    #[tokio::test]
    async fn test_evaluate_teachback_scores() {
        let service = service();
        service.select_topic(select("loops")).await;

        let full = service
            .evaluate_teachback(answer("Loops repeat blocks of code."))
            .await;
        assert!(full.contains("clear and covers main points"));
        assert!(full.ends_with("(score: 10/10)"));

        let none = service.evaluate_teachback(answer("no idea")).await;
        assert!(none.ends_with("(score: 1/10)"));

        let again = service
            .evaluate_teachback(answer("Loops repeat blocks of code."))
            .await;
        assert_eq!(full, again);
    }

    #[tokio::test]
    async fn test_history_records_every_call() {
        let service = service();
        service.list_topics().await;
        service.select_topic(select("loops")).await;
        service.set_mode(mode("nope")).await;
        service.explain_topic().await;

        let history = state(&service).await.history;
        let tools: Vec<_> = history.iter().map(|i| i.tool.as_str()).collect();
        assert_eq!(
            tools,
            vec!["list_topics", "select_topic", "set_mode", "explain_topic"]
        );
        assert_eq!(history[1].argument.as_deref(), Some("loops"));
        assert_eq!(history[3].result, "Loops repeat code blocks");
    }

    #[tokio::test]
    async fn test_state_updates_are_broadcast() {
        let content = Arc::new(ContentStore::from_json_str(CONTENT).unwrap());
        let (tx, mut rx) = mpsc::channel(8);
        let service = TutorService::new(
            content,
            Arc::new(Mutex::new(Userdata::new(None))),
            Some(tx),
        );

        service.select_topic(select("variables")).await;
        service.set_mode(mode("teach_back")).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.current_topic_id.as_deref(), Some("variables"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.mode, Mode::TeachBack);
    }

    #[tokio::test]
    async fn test_full_state_channel_does_not_block_tools() {
        let content = Arc::new(ContentStore::from_json_str(CONTENT).unwrap());
        let (tx, mut rx) = mpsc::channel(1);
        let service = TutorService::new(
            content,
            Arc::new(Mutex::new(Userdata::new(None))),
            Some(tx),
        );

        let calls = async {
            service.select_topic(select("variables")).await;
            service.set_mode(mode("quiz")).await;
            service.select_topic(select("loops")).await
        };
        let last = tokio::time::timeout(std::time::Duration::from_secs(1), calls)
            .await
            .expect("tool calls blocked on a full state channel");
        assert_eq!(last, "Selected topic: Loops.");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.current_topic_id.as_deref(), Some("variables"));
        assert!(rx.try_recv().is_err());
        assert_eq!(state(&service).await.mode, Mode::Quiz);
    }

    #[tokio::test]
    async fn test_tool_router_registers_all_tools() {
        let service = service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "ask_quiz",
                "evaluate_teachback",
                "explain_topic",
                "list_topics",
                "prompt_teachback",
                "select_topic",
                "set_mode",
            ]
        );
    }
}
