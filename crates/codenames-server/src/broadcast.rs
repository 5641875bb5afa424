//! Fan-out of session updates to seats and observers.
//!
//! Every recipient gets the payload variant matching what it may see:
//! spymasters get color-revealing payloads, operatives and observers get
//! hidden ones. A failed send to a seated player aborts the call; a failed
//! send to an observer only evicts that observer.

use codenames_core::protocol::{Role, ServerMessage};
use codenames_core::transport::{ConnectionId, Outbox};

use crate::error::SessionError;
use crate::session::Session;

/// Which payload variant a recipient receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Spymaster,
    Operative,
    Observer,
}

impl Viewer {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Spymaster => Viewer::Spymaster,
            Role::Operative => Viewer::Operative,
        }
    }

    pub fn reveals_colors(self) -> bool {
        self == Viewer::Spymaster
    }
}

/// Send one message to every seat and observer.
pub async fn to_all(session: &Session, msg: &ServerMessage) -> Result<(), SessionError> {
    deliver(session, None, |_| msg.clone()).await
}

/// Like [`to_all`], skipping one connection (e.g. the player who just
/// joined).
pub async fn to_all_except(
    session: &Session,
    exclude: ConnectionId,
    msg: &ServerMessage,
) -> Result<(), SessionError> {
    deliver(session, Some(exclude), |_| msg.clone()).await
}

/// Send each recipient the payload built for its viewer kind.
pub async fn by_viewer<F>(session: &Session, payload_for: F) -> Result<(), SessionError>
where
    F: Fn(Viewer) -> ServerMessage,
{
    deliver(session, None, payload_for).await
}

/// The board, revealed to spymasters and hidden from everyone else.
pub async fn board(session: &Session) -> Result<(), SessionError> {
    let (revealed, hidden) = {
        let state = session.state.lock().await;
        (state.board.view(true), state.board.view(false))
    };
    by_viewer(session, |viewer| ServerMessage::Board {
        cells: if viewer.reveals_colors() {
            revealed.clone()
        } else {
            hidden.clone()
        },
        can_guess: false,
    })
    .await
}

/// The fully revealed board, to everyone. Used once the game is decided.
pub async fn full_reveal(session: &Session) -> Result<(), SessionError> {
    let cells = session.state.lock().await.board.view(true);
    to_all(
        session,
        &ServerMessage::Board {
            cells,
            can_guess: false,
        },
    )
    .await
}

async fn deliver<F>(
    session: &Session,
    exclude: Option<ConnectionId>,
    payload_for: F,
) -> Result<(), SessionError>
where
    F: Fn(Viewer) -> ServerMessage,
{
    // Recipients are listed under the state lock, which observers also hold
    // while joining. Sends run after both locks are released.
    let (seated, observers) = {
        let state = session.state.lock().await;
        let seated = state.seated()?;
        let observers: Vec<Outbox> = session.observers.lock().await.values().cloned().collect();
        (seated, observers)
    };

    for player in &seated {
        if exclude == Some(player.conn.id()) {
            continue;
        }
        player.conn.send(payload_for(Viewer::for_role(player.role)))?;
    }

    let mut evicted = Vec::new();
    for outbox in observers {
        if exclude == Some(outbox.id()) {
            continue;
        }
        if outbox.send(payload_for(Viewer::Observer)).is_err() {
            evicted.push(outbox.id());
        }
    }

    if !evicted.is_empty() {
        let mut lobby = session.observers.lock().await;
        for id in &evicted {
            lobby.remove(id);
        }
        tracing::info!(
            session = %session.id,
            evicted = evicted.len(),
            "Dropped unreachable observers"
        );
    }
    Ok(())
}
