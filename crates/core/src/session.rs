use crate::{usage::SessionMetrics, voice::VoiceProfile};
use anyhow::Result;
use async_trait::async_trait;
use rmcp::service::{RoleClient, RunningService};
use tokio::sync::mpsc;

/// Client half of the tool registry. The model driver lists and calls tools through it.
pub type ToolClient = RunningService<RoleClient, ()>;

/// Everything a voice session needs to start driving the tutor.
pub struct AgentConfig {
    /// Instructions text for the model driver.
    pub instructions: String,
    /// The registered tool set.
    pub tools: ToolClient,
    /// Synthesis voice to start with.
    pub voice: VoiceProfile,
}

/// The narrow contract the tutor needs from a real-time voice substrate.
///
/// Implementations own transport, speech recognition, turn detection, model
/// calls and synthesis. All methods take `&self` because the session handle is
/// shared between the orchestrator and the tool surface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Registers the tool set and instructions and opens the session.
    async fn start(&self, agent: AgentConfig) -> Result<()>;

    /// Speaks a single piece of text to the user.
    async fn say(&self, text: String) -> Result<()>;

    /// Runs the interaction loop until the session terminates.
    async fn run(&self) -> Result<()>;

    /// Switches the synthesis voice for subsequent speech.
    async fn update_synthesis(&self, profile: VoiceProfile) -> Result<()>;

    /// Subscribes to "metrics collected" events. May only be called once.
    async fn metrics_events(&self) -> Result<mpsc::Receiver<SessionMetrics>>;
}
