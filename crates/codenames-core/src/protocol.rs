use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// Both teams, in seating order (Blue acts first).
    pub const ALL: [Team; 2] = [Team::Blue, Team::Red];

    /// The team sitting across the table.
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    /// The board color owned by this team.
    pub fn color(self) -> CardColor {
        match self {
            Team::Red => CardColor::Red,
            Team::Blue => CardColor::Blue,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The job a seated player does for their team.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operative,
    Spymaster,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Operative, Role::Spymaster];

    pub fn label(self) -> &'static str {
        match self {
            Role::Operative => "operative",
            Role::Spymaster => "spymaster",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hidden color assignment of a board cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Red,
    Blue,
    White,
    Black,
}

impl CardColor {
    /// The team that owns this color, if any.
    pub fn team(self) -> Option<Team> {
        match self {
            CardColor::Red => Some(Team::Red),
            CardColor::Blue => Some(Team::Blue),
            CardColor::White | CardColor::Black => None,
        }
    }
}

/// A single cell as shown to one viewer.
///
/// `color` is `None` when the viewer is not allowed to see it yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellView {
    pub word: String,
    pub color: Option<CardColor>,
    pub open: bool,
}

/// Who sits in a seat, for lobby snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatInfo {
    pub team: Team,
    pub role: Role,
    pub taken: bool,
    pub nickname: Option<String>,
}

/// A clue as announced to everyone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClueInfo {
    pub team: Team,
    pub word: String,
    pub count: u32,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Watch a session without taking a seat.
    JoinLobby { session_id: String },

    /// Claim a (team, role) seat in a session.
    JoinSeat {
        session_id: String,
        team: Team,
        role: Role,
    },

    /// Set the display name (accepted once per player).
    SetNickname { player_id: String, nickname: String },

    /// Spymaster's hint. `team` is ignored: the server takes it from the
    /// authoring player.
    Clue {
        player_id: String,
        #[serde(default)]
        team: Option<Team>,
        word: String,
        count: u32,
    },

    /// Operative's guess, or a request to stop guessing.
    Guess {
        player_id: String,
        #[serde(default)]
        row: usize,
        #[serde(default)]
        col: usize,
        #[serde(default)]
        end_guessing: bool,
    },

    /// Ping to check connection
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Snapshot sent to a connection that joined a session's lobby.
    LobbyJoined {
        session_id: String,
        wordlist: String,
        seats: Vec<SeatInfo>,
        started: bool,
    },

    /// Private confirmation of a claimed seat.
    SeatClaimed {
        player_id: String,
        team: Team,
        role: Role,
    },

    /// Someone took a seat (nickname follows later).
    SomeoneJoined { team: Team, role: Role },

    /// A seated player picked their nickname.
    PlayerNamed {
        team: Team,
        role: Role,
        nickname: String,
    },

    /// Board as this recipient may see it. `can_guess` enables clicking.
    Board {
        cells: Vec<Vec<CellView>>,
        can_guess: bool,
    },

    /// Invitation for the acting spymaster to submit a clue.
    ClueRequested,

    /// Current clue; `None` clears it between turns.
    ClueGiven { clue: Option<ClueInfo> },

    /// The acting operative may submit up to `guesses` guesses.
    GuessingAllowed { guesses: u32 },

    /// Guessing affordance withdrawn.
    GuessingEnded,

    /// A cell was opened and its color revealed.
    CellOpened {
        row: usize,
        col: usize,
        word: String,
        color: CardColor,
    },

    /// Game over.
    GameOver { winner: Team },

    /// Error message
    Error { message: String },

    /// Pong response to ping
    Pong,
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Longest accepted nickname, in characters.
pub const MAX_NICKNAME_LEN: usize = 24;

/// Validate a nickname.
///
/// Nicknames must be non-blank, at most [`MAX_NICKNAME_LEN`] characters and
/// free of control characters.
pub fn validate_nickname(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Nickname cannot be empty".to_string());
    }
    if name.chars().count() > MAX_NICKNAME_LEN {
        return Err(format!(
            "Nickname must be at most {MAX_NICKNAME_LEN} characters"
        ));
    }
    if name.chars().any(char::is_control) {
        return Err("Nickname cannot contain control characters".to_string());
    }
    Ok(())
}

/// Validate a word-list name.
///
/// Names map to files on disk, so they must be 1..=32 characters of ASCII
/// alphanumerics, `-` or `_`.
pub fn validate_wordlist_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Word list name cannot be empty".to_string());
    }
    if name.len() > 32 {
        return Err("Word list name must be at most 32 characters".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Word list name must be alphanumeric, '-' or '_'".to_string());
    }
    Ok(())
}
