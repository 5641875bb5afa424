//! A single game session: its state machine plus the observer lobby.

use std::collections::HashMap;
use std::sync::Arc;

use codenames_core::board::Board;
use codenames_core::protocol::{SeatInfo, ServerMessage};
use codenames_core::transport::{ConnectionError, ConnectionId, Outbox};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::game_logic::{GameState, Phase, SEAT_ORDER};
use crate::roster::Roster;
use crate::turn_engine;

/// Opaque session identity token.
pub type SessionId = String;

pub struct Session {
    pub id: SessionId,
    /// Word list the board was drawn from.
    pub wordlist: String,
    pub state: Mutex<GameState>,
    /// Connections watching without a seat.
    pub observers: Mutex<HashMap<ConnectionId, Outbox>>,
}

impl Session {
    pub fn new(wordlist: &str, board: Board) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            wordlist: wordlist.to_string(),
            state: Mutex::new(GameState::new(board)),
            observers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn add_observer(&self, outbox: Outbox) {
        let mut observers = self.observers.lock().await;
        observers.insert(outbox.id(), outbox);
    }

    /// Returns whether the connection was watching.
    pub async fn remove_observer(&self, id: ConnectionId) -> bool {
        let mut observers = self.observers.lock().await;
        observers.remove(&id).is_some()
    }

    #[cfg(test)]
    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Start watching: the connection gets the lobby snapshot, then what it
    /// needs to catch up, then every later broadcast.
    ///
    /// All of it happens under the state lock. Broadcasts list their
    /// recipients under the same lock, so an update either reaches the new
    /// observer or is already part of its catch-up.
    pub async fn join_observer(&self, outbox: Outbox) -> Result<(), ConnectionError> {
        let state = self.state.lock().await;
        outbox.send(self.lobby_snapshot(&state).await)?;
        for msg in catch_up(&state) {
            outbox.send(msg)?;
        }
        self.add_observer(outbox).await;
        Ok(())
    }

    /// Seat occupancy and nicknames.
    async fn lobby_snapshot(&self, state: &GameState) -> ServerMessage {
        let mut seats = Vec::with_capacity(SEAT_ORDER.len());
        for (team, role) in SEAT_ORDER {
            let player = state.seat(team, role);
            let nickname = match player {
                Some(p) => p.nickname().await,
                None => None,
            };
            seats.push(SeatInfo {
                team,
                role,
                taken: player.is_some(),
                nickname,
            });
        }

        ServerMessage::LobbyJoined {
            session_id: self.id.clone(),
            wordlist: self.wordlist.clone(),
            seats,
            started: state.begun,
        }
    }

    /// Start the turn engine if all seats are filled.
    ///
    /// Idempotent: only the first call that finds every seat filled spawns
    /// the engine and gets its handle.
    pub async fn maybe_begin(self: &Arc<Self>, roster: &Arc<Roster>) -> Option<JoinHandle<()>> {
        let begun = self.state.lock().await.try_begin();
        if !begun {
            return None;
        }
        tracing::info!(session = %self.id, "All seats filled, starting game");
        Some(tokio::spawn(turn_engine::run(
            Arc::clone(self),
            Arc::clone(roster),
        )))
    }
}

/// The board as observers see it and the current clue, or the revealed
/// board and result once the game is over. Nothing before the game starts.
fn catch_up(state: &GameState) -> Vec<ServerMessage> {
    if !state.begun {
        return Vec::new();
    }
    if state.phase == Phase::Concluded {
        let mut msgs = vec![ServerMessage::Board {
            cells: state.board.view(true),
            can_guess: false,
        }];
        if let Some(winner) = state.winner {
            msgs.push(ServerMessage::GameOver { winner });
        }
        return msgs;
    }
    vec![
        ServerMessage::Board {
            cells: state.board.view(false),
            can_guess: false,
        },
        ServerMessage::ClueGiven {
            clue: state.clue.as_ref().map(|c| c.info()),
        },
    ]
}
