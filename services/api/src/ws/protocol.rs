//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! The browser handles speech: it transcribes the user's voice into
//! `user_message` events and synthesizes `speak` events with the given voice.

use serde::{Deserialize, Serialize};
use tutor_core::{state::TutorState, voice::VoiceProfile};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A transcribed user utterance.
    UserMessage { text: String },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The session is up and the tool set is registered.
    SessionStarted {
        session_id: Uuid,
        #[serde(flatten)]
        voice: VoiceProfile,
    },
    /// Text for the client to synthesize with the given voice.
    Speak {
        text: String,
        #[serde(flatten)]
        voice: VoiceProfile,
    },
    /// Synthesis parameters changed; applies to subsequent speech.
    VoiceUpdated {
        #[serde(flatten)]
        voice: VoiceProfile,
    },
    /// Pushes the complete, updated tutor state to the client.
    StateUpdate { state: TutorState },
    /// Reports an error to the client.
    Error { message: String },
}
