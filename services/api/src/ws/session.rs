//! Manages the WebSocket connection lifecycle for a tutoring session.
//!
//! The browser is the voice substrate's front end: it transcribes speech into
//! text and synthesizes the `speak` events it receives. `WsVoiceSession` adapts
//! that connection to the `VoiceSession` contract so the orchestrator can drive
//! it exactly like any other substrate.

use super::{
    cycle::handle_react_cycle,
    protocol::{ClientMessage, ServerMessage},
};
use crate::state::AppState;
use anyhow::{Context, Result, anyhow};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    Sink, SinkExt, Stream, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info, instrument, warn};
use tutor_core::{
    llm_client::LLMClient,
    orchestrator::SessionOrchestrator,
    session::{AgentConfig, ToolClient, VoiceSession},
    state::TutorState,
    usage::SessionMetrics,
    voice::VoiceProfile,
};
use uuid::Uuid;

/// Buffer for tutor state snapshots and metrics events.
const EVENT_BUFFER: usize = 64;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Runs one orchestrated tutoring session per connection.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("New WebSocket connection.");

    let (socket_tx, socket_rx) = socket.split();
    let (state_tx, state_rx) = mpsc::channel(EVENT_BUFFER);
    let session: Arc<SocketSession> = Arc::new(WsVoiceSession::new(
        session_id,
        socket_tx,
        socket_rx,
        state.llm_client.clone(),
        state_rx,
    ));

    let orchestrator =
        SessionOrchestrator::new(state.content.clone(), state.instructions.to_string())
            .with_state_updates(state_tx);

    match orchestrator.run(session.clone()).await {
        Ok(summary) => info!(
            llm_requests = summary.llm_requests,
            tts_characters = summary.tts_characters,
            "WebSocket session finished."
        ),
        Err(e) => {
            error!(error = ?e, "Tutor session could not be started.");
            let _ = session
                .send(ServerMessage::Error {
                    message: e.to_string(),
                })
                .await;
        }
    }
}

/// The tool set and instructions registered by `start`.
struct ActiveAgent {
    instructions: String,
    tools: ToolClient,
}

/// A `VoiceSession` backed by a WebSocket and the model driver.
pub struct WsVoiceSession<Tx, Rx> {
    session_id: Uuid,
    llm_client: Arc<dyn LLMClient>,
    socket_tx: Mutex<Tx>,
    socket_rx: Mutex<Option<Rx>>,
    state_rx: Mutex<Option<mpsc::Receiver<TutorState>>>,
    agent: Mutex<Option<ActiveAgent>>,
    voice: Mutex<VoiceProfile>,
    /// Latest snapshot pushed by the tool surface.
    tutor_state: Mutex<TutorState>,
    conversation: Mutex<Vec<ChatCompletionRequestMessage>>,
    metrics_tx: Mutex<Option<mpsc::Sender<SessionMetrics>>>,
}

/// The session type used for real connections.
pub type SocketSession = WsVoiceSession<SplitSink<WebSocket, Message>, SplitStream<WebSocket>>;

impl<Tx, Rx> WsVoiceSession<Tx, Rx>
where
    Tx: Sink<Message> + Unpin + Send,
    Tx::Error: std::error::Error + Send + Sync + 'static,
    Rx: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    pub fn new(
        session_id: Uuid,
        socket_tx: Tx,
        socket_rx: Rx,
        llm_client: Arc<dyn LLMClient>,
        state_rx: mpsc::Receiver<TutorState>,
    ) -> Self {
        Self {
            session_id,
            llm_client,
            socket_tx: Mutex::new(socket_tx),
            socket_rx: Mutex::new(Some(socket_rx)),
            state_rx: Mutex::new(Some(state_rx)),
            agent: Mutex::new(None),
            voice: Mutex::new(VoiceProfile::default()),
            tutor_state: Mutex::new(TutorState::default()),
            conversation: Mutex::new(vec![]),
            metrics_tx: Mutex::new(None),
        }
    }

    /// Serializes and sends a `ServerMessage` to the client.
    pub async fn send(&self, msg: ServerMessage) -> Result<()> {
        let serialized = serde_json::to_string(&msg)?;
        self.socket_tx
            .lock()
            .await
            .send(Message::Text(serialized.into()))
            .await?;
        Ok(())
    }

    async fn emit_metrics(&self, metrics: SessionMetrics) {
        if let Some(tx) = self.metrics_tx.lock().await.as_ref() {
            if let Err(e) = tx.try_send(metrics) {
                warn!(error = %e, "Dropping metrics event");
            }
        }
    }

    async fn forward_state(&self, state: TutorState) -> Result<()> {
        *self.tutor_state.lock().await = state.clone();
        self.send(ServerMessage::StateUpdate { state }).await
    }

    /// Runs the model over one transcribed utterance and speaks the reply.
    async fn handle_utterance(&self, text: String) -> Result<()> {
        info!(chars = text.chars().count(), "User utterance received");
        self.conversation.lock().await.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()?
                .into(),
        );

        let outcome = {
            let agent = self.agent.lock().await;
            let agent = agent.as_ref().context("Session has not been started")?;
            let tutor_state = self.tutor_state.lock().await.clone();
            let conversation = self.conversation.lock().await.clone();
            handle_react_cycle(
                self.llm_client.as_ref(),
                &agent.tools,
                &agent.instructions,
                &tutor_state,
                &conversation,
            )
            .await
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // A failed turn is reported to the client; the session stays open.
                error!(error = ?e, "ReAct cycle failed");
                return self
                    .send(ServerMessage::Error {
                        message: "Sorry, I couldn't process that. Please try again.".to_string(),
                    })
                    .await;
            }
        };

        for usage in outcome.usage {
            self.emit_metrics(usage.into()).await;
        }
        if !outcome.response.is_empty() {
            self.say(outcome.response).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<Tx, Rx> VoiceSession for WsVoiceSession<Tx, Rx>
where
    Tx: Sink<Message> + Unpin + Send,
    Tx::Error: std::error::Error + Send + Sync + 'static,
    Rx: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    async fn start(&self, agent: AgentConfig) -> Result<()> {
        *self.voice.lock().await = agent.voice;
        *self.agent.lock().await = Some(ActiveAgent {
            instructions: agent.instructions,
            tools: agent.tools,
        });
        self.send(ServerMessage::SessionStarted {
            session_id: self.session_id,
            voice: agent.voice,
        })
        .await
    }

    async fn say(&self, text: String) -> Result<()> {
        let voice = *self.voice.lock().await;
        self.send(ServerMessage::Speak {
            text: text.clone(),
            voice,
        })
        .await?;
        // Synthesis happens in the browser, so no audio duration is known here.
        self.emit_metrics(SessionMetrics::Tts {
            characters: text.chars().count() as u32,
            audio_duration: Duration::ZERO,
        })
        .await;
        self.conversation.lock().await.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(text)
                .build()?
                .into(),
        );
        Ok(())
    }

    async fn run(&self) -> Result<()> {
        let mut socket_rx = self
            .socket_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("Session run loop already started"))?;
        let mut state_rx = self.state_rx.lock().await.take();

        loop {
            tokio::select! {
                msg_result = socket_rx.next() => match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::UserMessage { text }) => self.handle_utterance(text).await?,
                            Err(e) => warn!(error = %e, "Ignoring malformed client message."),
                        }
                        // Snapshots produced during the turn go out before the next one starts.
                        if let Some(rx) = state_rx.as_mut() {
                            while let Ok(state) = rx.try_recv() {
                                self.forward_state(state).await?;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed the connection.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(anyhow!(e).context("WebSocket receive failed")),
                },
                Some(state) = next_state(&mut state_rx) => self.forward_state(state).await?,
            }
        }
        Ok(())
    }

    async fn update_synthesis(&self, profile: VoiceProfile) -> Result<()> {
        *self.voice.lock().await = profile;
        info!(voice = profile.voice, style = profile.style, "Voice updated");
        self.send(ServerMessage::VoiceUpdated { voice: profile }).await
    }

    async fn metrics_events(&self) -> Result<mpsc::Receiver<SessionMetrics>> {
        let mut metrics_tx = self.metrics_tx.lock().await;
        if metrics_tx.is_some() {
            return Err(anyhow!("Metrics events already subscribed"));
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *metrics_tx = Some(tx);
        Ok(rx)
    }
}

async fn next_state(state_rx: &mut Option<mpsc::Receiver<TutorState>>) -> Option<TutorState> {
    match state_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
