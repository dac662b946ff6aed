//! Tutor API Library Crate
//!
//! Hosts tutoring sessions over WebSockets and exposes the topic catalog as a
//! small REST API. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod router;
pub mod state;
pub mod ws;
