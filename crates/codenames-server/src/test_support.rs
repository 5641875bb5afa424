//! Fixtures shared by the server's unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use codenames_core::board::{Board, Cell};
use codenames_core::protocol::{CardColor, Role, ServerMessage, Team};
use codenames_core::transport::{Connection, ConnectionIo};
use codenames_core::words::{BoardWordSource, WordSourceError};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::game_logic::SEAT_ORDER;
use crate::roster::{Player, Roster};
use crate::session::Session;

const WAIT: Duration = Duration::from_secs(5);

/// A known layout, row-major:
///
/// ```text
/// B B B B B
/// B B B B R
/// R R R R R
/// R R W W W
/// W W W W K
/// ```
pub fn fixed_board() -> Board {
    use CardColor::*;
    let colors = [
        [Blue, Blue, Blue, Blue, Blue],
        [Blue, Blue, Blue, Blue, Red],
        [Red, Red, Red, Red, Red],
        [Red, Red, White, White, White],
        [White, White, White, White, Black],
    ];
    let cells = colors
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, &color)| Cell::new(format!("word{i}"), color))
        .collect();
    Board::from_cells(cells).expect("fixed board has 25 cells")
}

/// A player with a connection nobody reads.
pub fn test_player(team: Team, role: Role) -> Arc<Player> {
    let (conn, _io) = Connection::new();
    Arc::new(Player::new(
        "test-session".to_string(),
        team,
        role,
        Arc::new(conn),
    ))
}

/// A word source that always returns the same words.
pub struct FixedWords(pub Vec<String>);

impl FixedWords {
    pub fn numbered(n: usize) -> Self {
        Self((0..n).map(|i| format!("w{i}")).collect())
    }
}

impl BoardWordSource for FixedWords {
    fn fetch_words(&self, _list_name: &str) -> Result<Vec<String>, WordSourceError> {
        Ok(self.0.clone())
    }
}

/// Whether `msg` is a board with every color shown.
pub fn is_revealing_board(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::Board { cells, .. }
        if cells.iter().flatten().all(|c| c.color.is_some()))
}

/// Everything queued on a bare connection so far.
pub fn drain_io(io: &mut ConnectionIo) -> Vec<ServerMessage> {
    let mut msgs = Vec::new();
    while let Ok(msg) = io.outgoing.try_recv() {
        msgs.push(msg);
    }
    msgs
}

/// Wait for a turn engine task to finish.
pub async fn await_engine(engine: JoinHandle<()>) {
    tokio::time::timeout(WAIT, engine)
        .await
        .expect("turn engine did not finish")
        .expect("turn engine panicked");
}

/// A seated player plus the socket-side ends of its connection.
pub struct TestSeat {
    pub player: Arc<Player>,
    pub io: ConnectionIo,
}

impl TestSeat {
    /// Everything queued for this seat so far.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        drain_io(&mut self.io)
    }

    pub async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(WAIT, self.io.outgoing.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
    }

    /// Skip messages until one matches `pred`.
    pub async fn wait_for(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let msg = self.next().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    pub fn send_raw(&self, text: &str) {
        self.io
            .incoming
            .send(text.to_string())
            .expect("inbox closed");
    }

    pub fn send(&self, value: serde_json::Value) {
        self.send_raw(&value.to_string());
    }

    pub fn clue(&self, word: &str, count: u32) {
        self.send(json!({
            "type": "Clue",
            "player_id": self.player.id,
            "word": word,
            "count": count,
        }));
    }

    pub fn guess(&self, row: usize, col: usize) {
        self.send(json!({
            "type": "Guess",
            "player_id": self.player.id,
            "row": row,
            "col": col,
        }));
    }

    pub fn stop(&self) {
        self.send(json!({
            "type": "Guess",
            "player_id": self.player.id,
            "end_guessing": true,
        }));
    }
}

/// A registered session with some or all seats claimed through the roster.
pub struct Table {
    pub roster: Arc<Roster>,
    pub session: Arc<Session>,
    seats: HashMap<(Team, Role), TestSeat>,
}

impl Table {
    pub async fn seated() -> Self {
        Self::partial(&SEAT_ORDER).await
    }

    pub async fn partial(claims: &[(Team, Role)]) -> Self {
        let roster = Arc::new(Roster::new());
        let session = Arc::new(Session::new("test", fixed_board()));
        roster.register_session(Arc::clone(&session)).await;

        let mut seats = HashMap::new();
        for &(team, role) in claims {
            let (conn, io) = Connection::new();
            let player = roster
                .join_seat(&session.id, team, role, Arc::new(conn))
                .await
                .expect("seat is free");
            seats.insert((team, role), TestSeat { player, io });
        }
        Self {
            roster,
            session,
            seats,
        }
    }

    pub fn seat(&self, team: Team, role: Role) -> &TestSeat {
        &self.seats[&(team, role)]
    }

    pub fn seat_mut(&mut self, team: Team, role: Role) -> &mut TestSeat {
        self.seats
            .get_mut(&(team, role))
            .expect("seat was claimed")
    }

    /// Close a seat's socket side, as if the client went away.
    pub fn drop_seat(&mut self, team: Team, role: Role) {
        self.seats.remove(&(team, role));
    }

    pub async fn begin(&self) -> JoinHandle<()> {
        self.session
            .maybe_begin(&self.roster)
            .await
            .expect("all seats are filled")
    }
}
