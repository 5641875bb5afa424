//! Per-connection message plumbing.
//!
//! A [`Connection`] is the server-side end of one client: an outbound queue
//! of [`ServerMessage`]s and an inbound queue of raw text frames. The
//! socket task owns the opposite ends ([`ConnectionIo`]) and pumps frames
//! between the wire and the queues, so game code never touches the
//! transport directly.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::protocol::ServerMessage;

/// Process-unique connection identifier.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur on a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The remote peer closed the connection, or its socket task exited.
    #[error("connection {0} closed")]
    Closed(ConnectionId),
}

/// Cloneable send-only handle to a connection.
///
/// Sends never block: messages are queued and written by the socket task in
/// order.
#[derive(Debug, Clone)]
pub struct Outbox {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Outbox {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, msg: ServerMessage) -> Result<(), ConnectionError> {
        self.tx.send(msg).map_err(|_| ConnectionError::Closed(self.id))
    }
}

/// The socket-side ends of a [`Connection`].
pub struct ConnectionIo {
    /// Messages to write to the wire.
    pub outgoing: mpsc::UnboundedReceiver<ServerMessage>,
    /// Frames read from the wire. Dropping it closes the connection's inbox.
    pub incoming: mpsc::UnboundedSender<String>,
}

/// Server-side handle to one client connection.
#[derive(Debug)]
pub struct Connection {
    outbox: Outbox,
    inbox: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Connection {
    /// Create a connection together with the ends the socket task drives.
    pub fn new() -> (Self, ConnectionIo) {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = Self {
            outbox: Outbox { id, tx: out_tx },
            inbox: Mutex::new(in_rx),
        };
        let io = ConnectionIo {
            outgoing: out_rx,
            incoming: in_tx,
        };
        (conn, io)
    }

    pub fn id(&self) -> ConnectionId {
        self.outbox.id
    }

    /// A send-only handle sharing this connection's queue.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn send(&self, msg: ServerMessage) -> Result<(), ConnectionError> {
        self.outbox.send(msg)
    }

    /// Wait for the next inbound frame. There is no timeout.
    pub async fn receive(&self) -> Result<String, ConnectionError> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await.ok_or(ConnectionError::Closed(self.id()))
    }

    /// Drop every frame that is already queued; returns how many were dropped.
    pub async fn discard_pending(&self) -> usize {
        let mut inbox = self.inbox.lock().await;
        let mut dropped = 0;
        while inbox.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
