//! Main Entrypoint for the Tutor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the topic catalog. A missing or malformed catalog is fatal.
//! 3. Rendering the tutor instructions and building the model driver.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tutor_api::{
    config::{Config, Provider},
    prompts::resolve_instructions,
    router::create_router,
    state::AppState,
};
use tutor_core::{
    content::ContentStore,
    llm_client::{LLMClient, OpenAICompatibleClient},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = ?e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Tutoring Content ---
    let content = Arc::new(ContentStore::load(&config.content_path).with_context(|| {
        format!(
            "Failed to load tutoring content from {}",
            config.content_path.display()
        )
    })?);
    info!(topics = content.len(), "Tutoring content loaded.");

    // --- 4. Initialize Shared Services ---
    let instructions = Arc::new(resolve_instructions(
        config.prompts_path.as_deref(),
        &content,
    )?);

    let openai_config = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY is not set")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://api.openai.com/v1/")
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .as_ref()
                .context("GEMINI_API_KEY is not set")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai")
        }
    };
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let app_state = Arc::new(AppState {
        content,
        llm_client,
        instructions,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
