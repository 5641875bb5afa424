//! Process-wide registries of players and sessions.
//!
//! Both maps sit behind their own `RwLock`: lookups run concurrently while
//! registration takes exclusive access. Claiming a seat holds the player
//! map's write lock *and* the session's state lock at once, so two joiners
//! can never both win the same seat.
//!
//! Lock order is always roster → session state → observer lobby; nothing
//! takes a roster lock while holding a session lock.

use std::collections::HashMap;
use std::sync::Arc;

use codenames_core::board::Board;
use codenames_core::protocol::{Role, Team, validate_nickname};
use codenames_core::transport::Connection;
use codenames_core::words::BoardWordSource;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{Session, SessionId};

/// Opaque player identity token.
pub type PlayerId = String;

/// A seated player.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub team: Team,
    pub role: Role,
    nickname: RwLock<Option<String>>,
    pub conn: Arc<Connection>,
}

impl Player {
    pub fn new(session_id: SessionId, team: Team, role: Role, conn: Arc<Connection>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            team,
            role,
            nickname: RwLock::new(None),
            conn,
        }
    }

    pub async fn nickname(&self) -> Option<String> {
        self.nickname.read().await.clone()
    }

    /// Set the display name. Only the first valid call succeeds.
    pub async fn set_nickname(&self, nickname: &str) -> Result<(), SessionError> {
        validate_nickname(nickname).map_err(SessionError::MalformedMessage)?;
        let mut current = self.nickname.write().await;
        if current.is_some() {
            return Err(SessionError::Unauthorized(
                "nickname is already set".to_string(),
            ));
        }
        *current = Some(nickname.trim().to_string());
        Ok(())
    }
}

/// Player and session registries.
pub struct Roster {
    players: RwLock<HashMap<PlayerId, Arc<Player>>>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Seat claims register through [`Roster::join_seat`] instead.
    #[cfg(test)]
    pub async fn register_player(&self, player: Arc<Player>) {
        let mut players = self.players.write().await;
        players.insert(player.id.clone(), player);
    }

    pub async fn lookup_player(&self, id: &str) -> Result<Arc<Player>, SessionError> {
        let players = self.players.read().await;
        players
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::player_not_found(id))
    }

    pub async fn register_session(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    pub async fn lookup_session(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::session_not_found(id))
    }

    /// List active session IDs.
    pub async fn list_sessions(&self) -> Vec<SessionId> {
        let sessions = self.sessions.read().await;
        sessions.keys().cloned().collect()
    }

    /// Generate a board from `wordlist` and register a new session.
    ///
    /// Nothing is registered if the word source fails.
    pub async fn create_session(
        &self,
        source: &dyn BoardWordSource,
        wordlist: &str,
    ) -> Result<Arc<Session>, SessionError> {
        let board = Board::generate(source, wordlist, Team::Blue, &mut rand::rng())?;
        let session = Arc::new(Session::new(wordlist, board));
        self.register_session(Arc::clone(&session)).await;
        tracing::info!(session = %session.id, wordlist = %session.wordlist, "Session created");
        Ok(session)
    }

    /// Claim the `(team, role)` seat of a session for a new player.
    pub async fn join_seat(
        &self,
        session_id: &str,
        team: Team,
        role: Role,
        conn: Arc<Connection>,
    ) -> Result<Arc<Player>, SessionError> {
        let session = self.lookup_session(session_id).await?;

        // Seat check, seat write and roster write form one critical section.
        let mut players = self.players.write().await;
        let mut state = session.state.lock().await;
        let player = Arc::new(Player::new(session.id.clone(), team, role, conn));
        state.claim_seat(Arc::clone(&player))?;
        players.insert(player.id.clone(), Arc::clone(&player));

        tracing::info!(
            session = %session.id,
            player = %player.id,
            %team,
            %role,
            "Seat claimed"
        );
        Ok(player)
    }
}
