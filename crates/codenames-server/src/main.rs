//! Multi-session Axum Codenames server.
//!
//! # Routes
//!
//! | Method | Path             | Description                              |
//! |--------|------------------|------------------------------------------|
//! | `GET`  | `/`              | Serve static web frontend                |
//! | `GET`  | `/ws`            | WebSocket upgrade for game connections   |
//! | `POST` | `/api/sessions`  | Create a session from a word list        |
//! | `GET`  | `/api/sessions`  | List active session IDs (JSON)           |
//! | `GET`  | `/api/wordlists` | List available word lists (JSON)         |
//!
//! See [`config`] for the environment variables.

mod broadcast;
mod config;
mod error;
mod game_logic;
mod roster;
mod session;
mod turn_engine;
mod ws_handler;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use codenames_core::words::FileWordSource;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use error::SessionError;
use roster::Roster;

/// Shared application state available to all handlers.
#[derive(Clone)]
struct AppState {
    roster: Arc<Roster>,
    words: Arc<FileWordSource>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    wordlist: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
    wordlist: String,
}

#[tokio::main]
async fn main() {
    // Initialise tracing (respects RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let state = AppState {
        roster: Arc::new(Roster::new()),
        words: Arc::new(FileWordSource::new(config.wordlist_dir.clone())),
    };

    // Try static files first, fall back to index.html for client-side routing.
    let serve_spa = ServeDir::new(&config.static_dir).not_found_service(ServeFile::new(format!(
        "{}/index.html",
        config.static_dir
    )));

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/sessions", get(sessions_handler).post(create_session_handler))
        .route("/api/wordlists", get(wordlists_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .fallback_service(serve_spa);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Codenames server listening on {addr}");
    tracing::info!("Serving static files from {}", config.static_dir);
    tracing::info!("Reading word lists from {}", config.wordlist_dir.display());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind {addr}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}

/// `GET /ws`: upgrade to WebSocket and hand off to [`ws_handler::handle_socket`].
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_handler::handle_socket(socket, state.roster))
}

/// `GET /api/sessions`: return a JSON array of active session IDs.
async fn sessions_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.roster.list_sessions().await)
}

/// `POST /api/sessions`: draw a board from the named list and open a session.
async fn create_session_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, SessionError> {
    let session = state
        .roster
        .create_session(state.words.as_ref(), &req.wordlist)
        .await?;
    Ok(Json(CreateSessionResponse {
        session_id: session.id.clone(),
        wordlist: session.wordlist.clone(),
    }))
}

/// `GET /api/wordlists`: return the names of the available word lists.
async fn wordlists_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, StatusCode> {
    state.words.list_names().map(Json).map_err(|e| {
        tracing::error!(error = %e, "Cannot list word lists");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
