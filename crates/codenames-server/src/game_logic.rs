//! Server-side game logic: seats, turn pointer, clue and guess evaluation.
//!
//! This module is transport-agnostic. It knows nothing about sockets or
//! serialization; the [`turn_engine`](crate::turn_engine) drives it and
//! the [`broadcast`](crate::broadcast) module announces its changes.

use std::sync::Arc;

use codenames_core::board::Board;
use codenames_core::protocol::{CardColor, ClueInfo, Role, Team};
use thiserror::Error;

use crate::error::SessionError;
use crate::roster::{Player, PlayerId};

/// Every seat, in broadcast order.
pub const SEAT_ORDER: [(Team, Role); 4] = [
    (Team::Blue, Role::Operative),
    (Team::Blue, Role::Spymaster),
    (Team::Red, Role::Operative),
    (Team::Red, Role::Spymaster),
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for all four seats.
    AwaitingSeats,
    /// The team's spymaster owes a clue.
    ClueCollection(Team),
    /// The team's operative is guessing.
    GuessCollection(Team),
    /// A winner was decided.
    Concluded,
    /// The turn engine stopped on a connection failure; no winner.
    Abandoned,
}

/// One team's seats and remaining words.
#[derive(Debug, Default)]
pub struct TeamState {
    pub operative: Option<Arc<Player>>,
    pub spymaster: Option<Arc<Player>>,
    pub words_left: usize,
}

impl TeamState {
    fn with_words(words_left: usize) -> Self {
        Self {
            words_left,
            ..Self::default()
        }
    }

    pub fn seat(&self, role: Role) -> Option<&Arc<Player>> {
        match role {
            Role::Operative => self.operative.as_ref(),
            Role::Spymaster => self.spymaster.as_ref(),
        }
    }

    fn seat_mut(&mut self, role: Role) -> &mut Option<Arc<Player>> {
        match role {
            Role::Operative => &mut self.operative,
            Role::Spymaster => &mut self.spymaster,
        }
    }
}

/// An accepted clue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clue {
    pub author: PlayerId,
    pub team: Team,
    pub word: String,
    pub count: u32,
}

impl Clue {
    /// Guesses the operative may make on this clue.
    pub fn guess_budget(&self) -> u32 {
        self.count.saturating_add(1)
    }

    pub fn info(&self) -> ClueInfo {
        ClueInfo {
            team: self.team,
            word: self.word.clone(),
            count: self.count,
        }
    }
}

/// Result of opening one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessOutcome {
    pub row: usize,
    pub col: usize,
    pub word: String,
    pub color: CardColor,
    /// The guessing phase must stop after this guess.
    pub ends_turn: bool,
    pub winner: Option<Team>,
}

/// Why a guess was refused without touching the board.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuessRejected {
    #[error("cell ({row}, {col}) is off the board")]
    OutOfBounds { row: usize, col: usize },

    #[error("cell ({row}, {col}) is already open")]
    AlreadyOpen { row: usize, col: usize },
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Mutable state of one session.
#[derive(Debug)]
pub struct GameState {
    pub board: Board,
    pub red: TeamState,
    pub blue: TeamState,
    /// Team that currently acts. Blue starts.
    pub turn: Team,
    pub clue: Option<Clue>,
    pub winner: Option<Team>,
    pub phase: Phase,
    /// Set once when all four seats are filled; never cleared.
    pub begun: bool,
}

impl GameState {
    pub fn new(board: Board) -> Self {
        let red = TeamState::with_words(board.count(CardColor::Red));
        let blue = TeamState::with_words(board.count(CardColor::Blue));
        Self {
            board,
            red,
            blue,
            turn: Team::Blue,
            clue: None,
            winner: None,
            phase: Phase::AwaitingSeats,
            begun: false,
        }
    }

    pub fn team(&self, team: Team) -> &TeamState {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut TeamState {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }

    pub fn seat(&self, team: Team, role: Role) -> Option<&Arc<Player>> {
        self.team(team).seat(role)
    }

    /// Put `player` into the seat matching its team and role.
    pub fn claim_seat(&mut self, player: Arc<Player>) -> Result<(), SessionError> {
        let (team, role) = (player.team, player.role);
        let seat = self.team_mut(team).seat_mut(role);
        if seat.is_some() {
            return Err(SessionError::SeatTaken { team, role });
        }
        *seat = Some(player);
        Ok(())
    }

    pub fn seats_filled(&self) -> bool {
        SEAT_ORDER
            .iter()
            .all(|&(team, role)| self.seat(team, role).is_some())
    }

    /// Start the game if every seat is filled and it has not started yet.
    ///
    /// Returns `true` exactly once per session.
    pub fn try_begin(&mut self) -> bool {
        if self.begun || !self.seats_filled() {
            return false;
        }
        self.begun = true;
        self.phase = Phase::ClueCollection(Team::Blue);
        true
    }

    pub fn has_ended(&self) -> bool {
        matches!(self.phase, Phase::Concluded | Phase::Abandoned)
    }

    /// The acting team's player in `role`.
    pub fn acting(&self, role: Role) -> Result<Arc<Player>, SessionError> {
        self.seat(self.turn, role)
            .cloned()
            .ok_or(SessionError::MissingSeat {
                team: self.turn,
                role,
            })
    }

    /// Seated players in [`SEAT_ORDER`].
    ///
    /// Empty seats are skipped while waiting for players; once the game has
    /// begun an empty seat is an error.
    pub fn seated(&self) -> Result<Vec<Arc<Player>>, SessionError> {
        let mut players = Vec::with_capacity(SEAT_ORDER.len());
        for (team, role) in SEAT_ORDER {
            match self.seat(team, role) {
                Some(player) => players.push(Arc::clone(player)),
                None if self.begun => return Err(SessionError::MissingSeat { team, role }),
                None => {}
            }
        }
        Ok(players)
    }

    /// Store an accepted clue and hand the move to the operative.
    pub fn set_clue(&mut self, clue: Clue) {
        self.phase = Phase::GuessCollection(clue.team);
        self.clue = Some(clue);
    }

    /// Open a cell for the acting team and evaluate the result.
    pub fn open_cell(&mut self, row: usize, col: usize) -> Result<GuessOutcome, GuessRejected> {
        let acting = self.turn;
        let cell = self
            .board
            .cell_mut(row, col)
            .ok_or(GuessRejected::OutOfBounds { row, col })?;
        if cell.open {
            return Err(GuessRejected::AlreadyOpen { row, col });
        }
        cell.open = true;
        let (word, color) = (cell.word.clone(), cell.color);

        let mut ends_turn = false;
        let mut winner = None;
        match color.team() {
            Some(owner) if owner == acting => {
                if self.take_word(owner) == 0 {
                    winner = Some(owner);
                }
            }
            // A reveal for the other team still counts for them.
            Some(owner) => {
                ends_turn = true;
                if self.take_word(owner) == 0 {
                    winner = Some(owner);
                }
            }
            None if color == CardColor::Black => {
                ends_turn = true;
                winner = Some(acting.opponent());
            }
            None => {}
        }

        if winner.is_some() {
            self.winner = winner;
        }

        Ok(GuessOutcome {
            row,
            col,
            word,
            color,
            ends_turn,
            winner,
        })
    }

    /// Decrement a team's counter; returns what is left.
    fn take_word(&mut self, team: Team) -> usize {
        let left = &mut self.team_mut(team).words_left;
        *left = left.saturating_sub(1);
        *left
    }

    /// Clear the clue and pass the move to the other team.
    pub fn end_turn(&mut self) {
        self.clue = None;
        self.turn = self.turn.opponent();
        self.phase = Phase::ClueCollection(self.turn);
    }

    pub fn conclude(&mut self) {
        self.phase = Phase::Concluded;
    }

    pub fn abandon(&mut self) {
        if !self.has_ended() {
            self.phase = Phase::Abandoned;
        }
    }
}
