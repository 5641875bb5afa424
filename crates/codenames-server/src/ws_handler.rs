//! WebSocket handler for the Codenames server.
//!
//! Each WebSocket connection follows this lifecycle:
//!
//! 1. The client may `JoinLobby` to watch a session as an observer.
//! 2. `JoinSeat` claims a seat; the connection is then bound to that player
//!    and the session may start.
//! 3. Seated frames other than `SetNickname` and `Ping` are queued on the
//!    connection's inbox, where the turn engine picks up clues and guesses.
//! 4. On disconnect the inbox closes; a running turn engine notices on its
//!    next read and abandons the session.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use codenames_core::protocol::{ClientMessage, ServerMessage};
use codenames_core::transport::{Connection, ConnectionIo};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::broadcast;
use crate::roster::{Player, Roster};
use crate::session::Session;

/// Drive a single WebSocket connection.
pub async fn handle_socket(socket: WebSocket, roster: Arc<Roster>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (conn, io) = Connection::new();
    let conn = Arc::new(conn);
    let ConnectionIo {
        mut outgoing,
        incoming,
    } = io;

    // Everything addressed to this connection goes through its outbox.
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if ws_sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // ── Lobby: watch sessions until a seat is claimed ────────────────────
    let mut watching: Option<Arc<Session>> = None;
    let seated = loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(seat) = lobby_frame(&roster, &conn, &mut watching, &text).await {
                    break Some(seat);
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break None,
            _ => continue,
        }
    };

    // ── Seated: route frames to the player's inbox ───────────────────────
    if let Some((player, session)) = &seated {
        loop {
            match ws_stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if seated_frame(player, session, &incoming, &text).await.is_break() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => continue,
            }
        }
    }

    // ── Cleanup ──────────────────────────────────────────────────────────
    if let Some(session) = watching {
        session.remove_observer(conn.id()).await;
    }
    drop(incoming);
    write_handle.abort();
    match &seated {
        Some((player, _)) => tracing::info!(
            session = %player.session_id,
            player = %player.id,
            team = %player.team,
            role = %player.role,
            "Player disconnected"
        ),
        None => tracing::debug!(conn = conn.id(), "Connection closed"),
    }
}

/// Handle one frame from a connection without a seat.
///
/// Returns the claimed seat once a `JoinSeat` succeeds.
async fn lobby_frame(
    roster: &Arc<Roster>,
    conn: &Arc<Connection>,
    watching: &mut Option<Arc<Session>>,
    text: &str,
) -> Option<(Arc<Player>, Arc<Session>)> {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            send_error(conn, format!("Invalid message: {e}"));
            return None;
        }
    };

    match msg {
        ClientMessage::JoinLobby { session_id } => {
            let session = match roster.lookup_session(&session_id).await {
                Ok(s) => s,
                Err(e) => {
                    send_error(conn, e);
                    return None;
                }
            };
            if let Some(previous) = watching.take() {
                previous.remove_observer(conn.id()).await;
            }
            if let Err(e) = session.join_observer(conn.outbox()).await {
                tracing::debug!(session = %session.id, error = %e, "Observer left while joining");
                return None;
            }
            tracing::debug!(session = %session.id, conn = conn.id(), "Observer joined");
            *watching = Some(session);
            None
        }
        ClientMessage::JoinSeat {
            session_id,
            team,
            role,
        } => {
            let joined = match roster.lookup_session(&session_id).await {
                Ok(session) => roster
                    .join_seat(&session_id, team, role, Arc::clone(conn))
                    .await
                    .map(|player| (player, session)),
                Err(e) => Err(e),
            };
            let (player, session) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    send_error(conn, e);
                    return None;
                }
            };

            if let Some(previous) = watching.take() {
                previous.remove_observer(conn.id()).await;
            }
            let _ = conn.send(ServerMessage::SeatClaimed {
                player_id: player.id.clone(),
                team,
                role,
            });
            if let Err(e) = broadcast::to_all_except(
                &session,
                conn.id(),
                &ServerMessage::SomeoneJoined { team, role },
            )
            .await
            {
                tracing::warn!(session = %session.id, error = %e, "Join announcement failed");
            }
            // The engine runs detached; its handle is only kept by tests.
            let _ = session.maybe_begin(roster).await;
            Some((player, session))
        }
        ClientMessage::Ping => {
            let _ = conn.send(ServerMessage::Pong);
            None
        }
        _ => {
            send_error(conn, "Must join a seat first");
            None
        }
    }
}

/// Handle one frame from a seated player.
///
/// Breaks once the player's inbox is gone.
async fn seated_frame(
    player: &Player,
    session: &Session,
    incoming: &mpsc::UnboundedSender<String>,
    text: &str,
) -> ControlFlow<()> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SetNickname {
            player_id,
            nickname,
        }) => set_nickname(player, session, &player_id, &nickname).await,
        Ok(ClientMessage::Ping) => {
            let _ = player.conn.send(ServerMessage::Pong);
        }
        _ => {
            if incoming.send(text.to_owned()).is_err() {
                return ControlFlow::Break(());
            }
        }
    }
    ControlFlow::Continue(())
}

async fn set_nickname(player: &Player, session: &Session, claimed_id: &str, nickname: &str) {
    if claimed_id != player.id {
        send_error(&player.conn, "Cannot rename another player");
        return;
    }
    if let Err(e) = player.set_nickname(nickname).await {
        send_error(&player.conn, e);
        return;
    }
    let Some(nickname) = player.nickname().await else {
        return;
    };
    tracing::info!(session = %player.session_id, player = %player.id, %nickname, "Nickname set");
    let named = ServerMessage::PlayerNamed {
        team: player.team,
        role: player.role,
        nickname,
    };
    if let Err(e) = broadcast::to_all(session, &named).await {
        tracing::warn!(session = %session.id, error = %e, "Nickname announcement failed");
    }
}

fn send_error(conn: &Connection, message: impl fmt::Display) {
    let _ = conn.send(ServerMessage::Error {
        message: message.to_string(),
    });
}
