pub mod agent;
pub mod content;
pub mod instructions;
pub mod llm_client;
pub mod orchestrator;
pub mod scoring;
pub mod session;
pub mod state;
pub mod usage;
pub mod voice;
