//! Error taxonomy for session operations.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use codenames_core::protocol::{Role, Team};
use codenames_core::transport::ConnectionError;
use codenames_core::words::WordSourceError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Unknown player or session identity.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("the {team} {role} seat is already taken")]
    SeatTaken { team: Team, role: Role },

    /// The seat should be filled but is not.
    #[error("the {team} {role} seat is empty")]
    MissingSeat { team: Team, role: Role },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    WordSource(#[from] WordSourceError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl SessionError {
    pub fn player_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "player",
            id: id.to_string(),
        }
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "session",
            id: id.to_string(),
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NotFound { .. }
            | SessionError::WordSource(WordSourceError::NotFound(_)) => StatusCode::NOT_FOUND,
            SessionError::WordSource(WordSourceError::Unreadable { .. })
            | SessionError::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
