//! Session Orchestrator
//!
//! Drives one tutoring session from start to finish:
//!
//! 1. **Idle → Active**: build a fresh `TutorState`, bind it with the session
//!    handle into `Userdata`, register the tool surface with the model driver,
//!    then greet the user.
//! 2. **Active**: the voice substrate runs its own loop, calling tools as the
//!    model decides. Mode switches change the voice without leaving Active.
//! 3. **Active → Ended**: when the run loop returns (or fails), the usage
//!    collected during the session is logged and the state is dropped.

use crate::{
    agent::{TutorService, Userdata},
    content::ContentStore,
    session::{AgentConfig, ToolClient, VoiceSession},
    state::TutorState,
    usage::{SessionMetrics, UsageCollector, UsageSummary},
    voice::VoiceProfile,
};
use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info};

/// Spoken as soon as the session is up.
pub const GREETING: &str =
    "Hello! I'm your tutor. Which mode would you like: learn, quiz, or teach-back?";

pub struct SessionOrchestrator {
    content: Arc<ContentStore>,
    instructions: String,
    state_tx: Option<mpsc::Sender<TutorState>>,
}

impl SessionOrchestrator {
    pub fn new(content: Arc<ContentStore>, instructions: String) -> Self {
        Self {
            content,
            instructions,
            state_tx: None,
        }
    }

    /// Forwards a snapshot of the tutor state after every mutating tool call.
    pub fn with_state_updates(mut self, state_tx: mpsc::Sender<TutorState>) -> Self {
        self.state_tx = Some(state_tx);
        self
    }

    /// Runs a session to completion and returns its usage summary.
    ///
    /// Errors are returned only when the session cannot be set up. A failing
    /// greeting or run loop is logged and ends the session normally.
    pub async fn run(self, session: Arc<dyn VoiceSession>) -> Result<UsageSummary> {
        let userdata = Arc::new(Mutex::new(Userdata::new(Some(session.clone()))));
        let service = TutorService::new(self.content.clone(), userdata, self.state_tx);
        let (tools, tool_handle) = serve_tools(service).await?;

        let metrics_rx = session
            .metrics_events()
            .await
            .context("Failed to subscribe to session metrics")?;
        let (shutdown_tx, collector) = spawn_usage_collector(metrics_rx);

        session
            .start(AgentConfig {
                instructions: self.instructions,
                tools,
                voice: VoiceProfile::default(),
            })
            .await
            .context("Failed to start voice session")?;
        info!(topics = self.content.len(), "Tutor session started");

        if let Err(e) = session.say(GREETING.to_string()).await {
            debug!(error = ?e, "Greeting failed; the agent will prompt when the run loop starts.");
        }

        match session.run().await {
            Ok(()) => info!("Tutor session ended"),
            Err(e) => error!(error = ?e, "Tutor session run loop failed"),
        }

        // Shutdown hook.
        let _ = shutdown_tx.send(());
        let summary = match collector.await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = ?e, "Usage collector task failed");
                UsageSummary::default()
            }
        };
        info!(usage = %summary, "Usage");
        tool_handle.abort();
        Ok(summary)
    }
}

/// Serves the tool surface over an in-process duplex pipe and returns the
/// connected client together with the server task.
pub async fn serve_tools(service: TutorService) -> Result<(ToolClient, JoinHandle<()>)> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let handle = tokio::spawn(async move {
        match service.serve(server_transport).await {
            Ok(running) => {
                let _ = running.waiting().await;
            }
            Err(e) => error!(error = ?e, "Tool service failed to start"),
        }
    });
    let client = ()
        .serve(client_transport)
        .await
        .context("Failed to connect to the tool service")?;

    Ok((client, handle))
}

/// Aggregates metrics events until told to stop, then drains what is still queued.
fn spawn_usage_collector(
    mut metrics_rx: mpsc::Receiver<SessionMetrics>,
) -> (oneshot::Sender<()>, JoinHandle<UsageSummary>) {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let mut collector = UsageCollector::new();
        loop {
            tokio::select! {
                Some(metrics) = metrics_rx.recv() => collector.collect(&metrics),
                _ = &mut shutdown_rx => break,
                else => break,
            }
        }
        while let Ok(metrics) = metrics_rx.try_recv() {
            collector.collect(&metrics);
        }
        collector.summary()
    });
    (shutdown_tx, handle)
}
