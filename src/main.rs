use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moodmap::chat::ChatResponder;
use moodmap::config::Config;
use moodmap::llm::HttpChatModel;
use moodmap::pipeline::Pipeline;
use moodmap::sources::firehose::{self, PostBuffer};
use moodmap::web::{self, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting moodmap");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        host = %config.web_host,
        port = config.web_port,
        "Configuration loaded"
    );

    if config.newsapi_key.is_none() {
        info!("NEWSAPI_KEY not set, news source will run degraded");
    }
    if config.llm_api_key.is_none() {
        info!("LLM_API_KEY not set, classification falls back to neutral");
    }

    // Start the firehose reader in the background when enabled; the buffer
    // is readable either way.
    let (buffer, firehose_handle) = if config.firehose_enabled {
        let buffer = Arc::new(PostBuffer::new(
            config.firehose_buffer_capacity,
            config.firehose_buffer_window,
        ));
        let url = config.firehose_url.clone();
        let delay = config.firehose_reconnect_delay;
        let reader_buffer = buffer.clone();
        let handle = tokio::spawn(async move {
            firehose::run_loop(url, reader_buffer, delay).await;
        });
        info!(url = %config.firehose_url, "Firehose reader started");
        (Some(buffer), Some(handle))
    } else {
        info!("Firehose disabled");
        (None, None)
    };

    let pipeline = Arc::new(Pipeline::from_config(&config, buffer));
    let chat_model = Arc::new(HttpChatModel::new(
        &config.llm_base_url,
        config.llm_api_key.clone(),
        &config.llm_model,
    ));
    let chat = Arc::new(ChatResponder::new(chat_model));

    let state = AppState { pipeline, chat };
    let host = config.web_host.clone();
    let port = config.web_port;
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(&host, port, state).await {
            error!("Web server error: {e:#}");
        }
    });

    shutdown_signal().await;

    info!("Shutting down...");

    web_handle.abort();
    if let Some(handle) = firehose_handle {
        handle.abort();
    }

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,moodmap=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
