//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources every
//! handler and session shares: the topic catalog, the model driver and the
//! rendered instructions.

use std::sync::Arc;
use tutor_core::{content::ContentStore, llm_client::LLMClient};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentStore>,
    pub llm_client: Arc<dyn LLMClient>,
    pub instructions: Arc<String>,
}
