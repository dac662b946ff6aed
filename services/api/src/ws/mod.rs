//! WebSocket Session Management
//!
//! Real-time tutoring sessions over WebSockets:
//!
//! - `protocol`: the JSON message format between browser and server.
//! - `session`: the connection lifecycle and the `VoiceSession` adapter.
//! - `cycle`: the "ReAct" (Reason-Act) logic run for each user utterance.

mod cycle;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
