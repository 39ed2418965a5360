//! HTTP surface: JSON routes over the pipeline and chat responder.

mod routes;

pub use routes::create_app;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::chat::ChatResponder;
use crate::pipeline::Pipeline;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub chat: Arc<ChatResponder>,
}

/// Start the web server and run until the socket closes.
///
/// # Errors
///
/// Returns an error if the bind address is invalid or the listener fails to
/// bind.
pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .await
        .context("Web server error")?;

    Ok(())
}
