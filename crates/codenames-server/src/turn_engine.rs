//! The per-session turn loop.
//!
//! One task per session drives the cycle: board broadcast, clue from the
//! acting spymaster, up to `count + 1` guesses from the acting operative,
//! then either the win announcement or a turn handoff. Each phase awaits
//! the acting player's inbox with no timeout.
//!
//! Bad input (undecodable, unknown author, wrong author, off-board cell) is
//! answered with an error and the phase waits again. A guess on an open
//! cell is dropped without a reply.
//! A failed read or send on a seated connection stops the engine and the
//! session is abandoned without a winner.

use std::fmt;
use std::sync::Arc;

use codenames_core::protocol::{ClientMessage, Role, ServerMessage, Team};

use crate::broadcast;
use crate::error::SessionError;
use crate::game_logic::{Clue, GuessRejected};
use crate::roster::{Player, Roster};
use crate::session::Session;

/// Run a session's game to the end.
pub async fn run(session: Arc<Session>, roster: Arc<Roster>) {
    tracing::info!(session = %session.id, "Game started");
    match play(&session, &roster).await {
        Ok(winner) => {
            tracing::info!(session = %session.id, %winner, "Game over");
        }
        Err(e) => {
            tracing::error!(session = %session.id, error = %e, "Turn engine stopped");
            session.state.lock().await.abandon();
        }
    }
}

async fn play(session: &Session, roster: &Roster) -> Result<Team, SessionError> {
    loop {
        broadcast::board(session).await?;

        let (team, spymaster, operative) = {
            let state = session.state.lock().await;
            (
                state.turn,
                state.acting(Role::Spymaster)?,
                state.acting(Role::Operative)?,
            )
        };

        // ── Clue ─────────────────────────────────────────────────────
        let clue = collect_clue(session, roster, &spymaster).await?;
        let budget = clue.guess_budget();
        let announced = clue.info();
        tracing::info!(
            session = %session.id,
            %team,
            word = %clue.word,
            count = clue.count,
            "Clue given"
        );
        session.state.lock().await.set_clue(clue);
        broadcast::to_all(
            session,
            &ServerMessage::ClueGiven {
                clue: Some(announced),
            },
        )
        .await?;

        // ── Guesses ──────────────────────────────────────────────────
        if let Some(winner) = collect_guesses(session, roster, &operative, budget).await? {
            finish(session, winner).await?;
            return Ok(winner);
        }

        // ── Handoff ──────────────────────────────────────────────────
        operative.conn.send(ServerMessage::GuessingEnded)?;
        session.state.lock().await.end_turn();
        broadcast::to_all(session, &ServerMessage::ClueGiven { clue: None }).await?;
        tracing::debug!(session = %session.id, next = %team.opponent(), "Turn handed over");
    }
}

/// Close the game and show everyone the answer.
///
/// The phase flips first, so an observer joining mid-announcement catches
/// up on the result instead of a live board.
pub async fn finish(session: &Session, winner: Team) -> Result<(), SessionError> {
    session.state.lock().await.conclude();
    broadcast::full_reveal(session).await?;
    broadcast::to_all(session, &ServerMessage::GameOver { winner }).await
}

/// Invite the spymaster and wait for an acceptable clue.
async fn collect_clue(
    session: &Session,
    roster: &Roster,
    spymaster: &Player,
) -> Result<Clue, SessionError> {
    spymaster.conn.discard_pending().await;
    spymaster.conn.send(ServerMessage::ClueRequested)?;
    loop {
        let text = spymaster.conn.receive().await?;
        match parse_clue(&text, roster, spymaster).await {
            Ok(clue) => return Ok(clue),
            Err(e) => reject(session, spymaster, e)?,
        }
    }
}

/// Let the operative guess up to `budget` cells.
///
/// Returns the winner if one of the guesses decided the game.
async fn collect_guesses(
    session: &Session,
    roster: &Roster,
    operative: &Player,
    budget: u32,
) -> Result<Option<Team>, SessionError> {
    operative.conn.discard_pending().await;
    operative
        .conn
        .send(ServerMessage::GuessingAllowed { guesses: budget })?;
    let cells = session.state.lock().await.board.view(false);
    operative.conn.send(ServerMessage::Board {
        cells,
        can_guess: true,
    })?;

    let mut remaining = budget;
    while remaining > 0 {
        let text = operative.conn.receive().await?;
        let (row, col) = match parse_guess(&text, roster, operative).await {
            Ok(GuessMove::Stop) => {
                tracing::debug!(session = %session.id, "Operative stopped guessing");
                break;
            }
            Ok(GuessMove::Open { row, col }) => (row, col),
            Err(e) => {
                reject(session, operative, e)?;
                continue;
            }
        };

        let opened = session.state.lock().await.open_cell(row, col);
        let outcome = match opened {
            Ok(outcome) => outcome,
            Err(e @ GuessRejected::AlreadyOpen { .. }) => {
                tracing::debug!(session = %session.id, reason = %e, "Guess ignored");
                continue;
            }
            Err(e) => {
                reject(session, operative, e)?;
                continue;
            }
        };
        remaining -= 1;

        broadcast::to_all(
            session,
            &ServerMessage::CellOpened {
                row,
                col,
                word: outcome.word.clone(),
                color: outcome.color,
            },
        )
        .await?;

        if outcome.winner.is_some() {
            return Ok(outcome.winner);
        }
        if outcome.ends_turn {
            break;
        }
    }
    Ok(None)
}

enum GuessMove {
    Stop,
    Open { row: usize, col: usize },
}

async fn parse_clue(text: &str, roster: &Roster, spymaster: &Player) -> Result<Clue, SessionError> {
    let ClientMessage::Clue {
        player_id,
        word,
        count,
        ..
    } = decode(text)?
    else {
        return Err(SessionError::MalformedMessage(
            "expected a clue".to_string(),
        ));
    };
    let author = authorize(roster, &player_id, spymaster).await?;

    let word = word.trim();
    if word.is_empty() {
        return Err(SessionError::MalformedMessage(
            "clue word is empty".to_string(),
        ));
    }
    Ok(Clue {
        author: author.id.clone(),
        team: author.team,
        word: word.to_string(),
        count,
    })
}

async fn parse_guess(
    text: &str,
    roster: &Roster,
    operative: &Player,
) -> Result<GuessMove, SessionError> {
    let ClientMessage::Guess {
        player_id,
        row,
        col,
        end_guessing,
    } = decode(text)?
    else {
        return Err(SessionError::MalformedMessage(
            "expected a guess".to_string(),
        ));
    };
    authorize(roster, &player_id, operative).await?;

    if end_guessing {
        Ok(GuessMove::Stop)
    } else {
        Ok(GuessMove::Open { row, col })
    }
}

fn decode(text: &str) -> Result<ClientMessage, SessionError> {
    serde_json::from_str(text).map_err(|e| SessionError::MalformedMessage(e.to_string()))
}

/// Resolve the claimed author and check it is the player whose move it is.
async fn authorize(
    roster: &Roster,
    claimed_id: &str,
    expected: &Player,
) -> Result<Arc<Player>, SessionError> {
    let author = roster.lookup_player(claimed_id).await?;
    if author.id != expected.id {
        return Err(SessionError::Unauthorized(format!(
            "waiting for the {} {}",
            expected.team, expected.role
        )));
    }
    Ok(author)
}

/// Log a refused message and tell the sender why.
fn reject(session: &Session, player: &Player, reason: impl fmt::Display) -> Result<(), SessionError> {
    let message = reason.to_string();
    tracing::warn!(
        session = %session.id,
        player = %player.id,
        reason = %message,
        "Message rejected"
    );
    player.conn.send(ServerMessage::Error { message })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_logic::Phase;
    use crate::test_support::{Table, await_engine, is_revealing_board};
    use codenames_core::transport::Connection;
    use serde_json::json;

    const BLUE_OP: (Team, Role) = (Team::Blue, Role::Operative);
    const BLUE_SPY: (Team, Role) = (Team::Blue, Role::Spymaster);
    const RED_OP: (Team, Role) = (Team::Red, Role::Operative);
    const RED_SPY: (Team, Role) = (Team::Red, Role::Spymaster);

    /// Give `clue` for the acting spymaster once invited.
    async fn give_clue(table: &mut Table, seat: (Team, Role), word: &str, count: u32) {
        let spymaster = table.seat_mut(seat.0, seat.1);
        spymaster
            .wait_for(|m| matches!(m, ServerMessage::ClueRequested))
            .await;
        spymaster.clue(word, count);
    }

    async fn await_guessing(table: &mut Table, seat: (Team, Role), guesses: u32) {
        table
            .seat_mut(seat.0, seat.1)
            .wait_for(|m| *m == ServerMessage::GuessingAllowed { guesses })
            .await;
    }

    async fn await_clue_request(table: &mut Table, seat: (Team, Role)) {
        table
            .seat_mut(seat.0, seat.1)
            .wait_for(|m| matches!(m, ServerMessage::ClueRequested))
            .await;
    }

    #[tokio::test]
    async fn two_correct_guesses_then_turn_passes_to_red() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "ocean", 2).await;
        await_guessing(&mut table, BLUE_OP, 3).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        operative.guess(0, 0);
        operative.guess(0, 1);
        operative.stop();

        await_clue_request(&mut table, RED_SPY).await;
        {
            let state = table.session.state.lock().await;
            assert_eq!(state.blue.words_left, 7);
            assert_eq!(state.red.words_left, 8);
            assert_eq!(state.turn, Team::Red);
            assert!(state.clue.is_none());
            assert_eq!(state.winner, None);
            assert_eq!(state.phase, Phase::ClueCollection(Team::Red));
        }

        let red_op = table.seat_mut(RED_OP.0, RED_OP.1).drain();
        assert!(red_op.contains(&ServerMessage::ClueGiven {
            clue: Some(codenames_core::protocol::ClueInfo {
                team: Team::Blue,
                word: "ocean".to_string(),
                count: 2,
            }),
        }));
        assert!(red_op.contains(&ServerMessage::ClueGiven { clue: None }));
        assert_eq!(
            red_op
                .iter()
                .filter(|m| matches!(m, ServerMessage::CellOpened { .. }))
                .count(),
            2
        );
        let blue_op = table.seat_mut(BLUE_OP.0, BLUE_OP.1).drain();
        assert!(blue_op.contains(&ServerMessage::GuessingEnded));

        engine.abort();
    }

    #[tokio::test]
    async fn black_cell_ends_the_game_for_the_guessing_team() {
        let mut table = Table::seated().await;
        let (observer, mut observer_io) = Connection::new();
        table.session.add_observer(observer.outbox()).await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "sky", 0).await;
        await_guessing(&mut table, BLUE_OP, 1).await;
        table.seat(BLUE_OP.0, BLUE_OP.1).stop();

        give_clue(&mut table, RED_SPY, "river", 1).await;
        await_guessing(&mut table, RED_OP, 2).await;
        table.seat(RED_OP.0, RED_OP.1).guess(4, 4);

        await_engine(engine).await;
        {
            let state = table.session.state.lock().await;
            assert_eq!(state.winner, Some(Team::Blue));
            assert_eq!(state.phase, Phase::Concluded);
        }

        // Nobody is listening any more.
        table.seat(RED_OP.0, RED_OP.1).guess(2, 0);
        tokio::task::yield_now().await;
        {
            let state = table.session.state.lock().await;
            assert!(!state.board.cell(2, 0).unwrap().open);
            assert_eq!(state.red.words_left, 8);
        }

        for (team, role) in crate::game_logic::SEAT_ORDER {
            let msgs = table.seat_mut(team, role).drain();
            assert_eq!(
                msgs.last(),
                Some(&ServerMessage::GameOver { winner: Team::Blue })
            );
        }

        // The observer only sees colors once the game is over.
        let mut observed = Vec::new();
        while let Ok(msg) = observer_io.outgoing.try_recv() {
            observed.push(msg);
        }
        let first_reveal = observed.iter().position(is_revealing_board).unwrap();
        assert_eq!(
            observed[first_reveal + 1..],
            [ServerMessage::GameOver { winner: Team::Blue }]
        );
    }

    #[tokio::test]
    async fn wrong_team_guess_ends_the_turn_at_once() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "fruit", 3).await;
        await_guessing(&mut table, BLUE_OP, 4).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        operative.guess(2, 0);
        operative.guess(0, 0);

        await_clue_request(&mut table, RED_SPY).await;
        let state = table.session.state.lock().await;
        assert!(state.board.cell(2, 0).unwrap().open);
        assert!(!state.board.cell(0, 0).unwrap().open);
        assert_eq!(state.red.words_left, 7);
        assert_eq!(state.blue.words_left, 9);
        assert_eq!(state.turn, Team::Red);
        drop(state);

        engine.abort();
    }

    #[tokio::test]
    async fn neutral_guesses_spend_the_budget() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "paper", 1).await;
        await_guessing(&mut table, BLUE_OP, 2).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        operative.guess(3, 2);
        operative.guess(3, 3);
        operative.guess(0, 0);

        await_clue_request(&mut table, RED_SPY).await;
        let state = table.session.state.lock().await;
        assert!(state.board.cell(3, 2).unwrap().open);
        assert!(state.board.cell(3, 3).unwrap().open);
        assert!(!state.board.cell(0, 0).unwrap().open);
        assert_eq!((state.blue.words_left, state.red.words_left), (9, 8));
        drop(state);

        engine.abort();
    }

    #[tokio::test]
    async fn reopening_a_cell_is_ignored_silently() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "tide", 1).await;
        await_guessing(&mut table, BLUE_OP, 2).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        operative.guess(0, 0);
        operative.guess(0, 0);
        operative.guess(0, 1);

        await_clue_request(&mut table, RED_SPY).await;
        let state = table.session.state.lock().await;
        assert!(state.board.cell(0, 1).unwrap().open);
        assert_eq!(state.blue.words_left, 7);
        drop(state);

        let errors = table
            .seat_mut(BLUE_OP.0, BLUE_OP.1)
            .drain()
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::Error { .. }))
            .count();
        assert_eq!(errors, 0);

        engine.abort();
    }

    #[tokio::test]
    async fn bad_clues_are_refused_and_the_phase_waits() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;
        let red_spymaster_id = table.seat(RED_SPY.0, RED_SPY.1).player.id.clone();

        await_clue_request(&mut table, BLUE_SPY).await;
        let spymaster = table.seat(BLUE_SPY.0, BLUE_SPY.1);
        spymaster.send_raw("not json");
        spymaster.send(json!({
            "type": "Clue",
            "player_id": red_spymaster_id,
            "word": "ocean",
            "count": 1,
        }));
        spymaster.send(json!({
            "type": "Clue",
            "player_id": "stranger",
            "word": "ocean",
            "count": 1,
        }));
        spymaster.clue("   ", 1);
        spymaster.guess(0, 0);
        spymaster.clue("ocean", 1);

        await_guessing(&mut table, BLUE_OP, 2).await;
        let errors = table
            .seat_mut(BLUE_SPY.0, BLUE_SPY.1)
            .drain()
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::Error { .. }))
            .count();
        assert_eq!(errors, 5);

        let state = table.session.state.lock().await;
        let clue = state.clue.as_ref().unwrap();
        assert_eq!(clue.word, "ocean");
        assert_eq!(clue.team, Team::Blue);
        drop(state);

        engine.abort();
    }

    #[tokio::test]
    async fn bad_guesses_do_not_spend_the_budget() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;
        let spymaster_id = table.seat(BLUE_SPY.0, BLUE_SPY.1).player.id.clone();

        give_clue(&mut table, BLUE_SPY, "ocean", 0).await;
        await_guessing(&mut table, BLUE_OP, 1).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        operative.send(json!({
            "type": "Guess",
            "player_id": spymaster_id,
            "row": 0,
            "col": 0,
        }));
        operative.guess(5, 0);
        operative.guess(0, 9);
        operative.send_raw("{}");
        operative.guess(0, 2);

        await_clue_request(&mut table, RED_SPY).await;
        let state = table.session.state.lock().await;
        assert_eq!(state.board.cells().iter().filter(|c| c.open).count(), 1);
        assert!(state.board.cell(0, 2).unwrap().open);
        assert_eq!(state.blue.words_left, 8);
        drop(state);

        engine.abort();
    }

    #[tokio::test]
    async fn clearing_the_last_word_wins() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "everything", 8).await;
        await_guessing(&mut table, BLUE_OP, 9).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        for col in 0..5 {
            operative.guess(0, col);
        }
        for col in 0..4 {
            operative.guess(1, col);
        }

        await_engine(engine).await;
        let state = table.session.state.lock().await;
        assert_eq!(state.blue.words_left, 0);
        assert_eq!(state.winner, Some(Team::Blue));
        assert_eq!(state.phase, Phase::Concluded);
        drop(state);

        let red_op = table.seat_mut(RED_OP.0, RED_OP.1).drain();
        let opened = red_op
            .iter()
            .rposition(|m| matches!(m, ServerMessage::CellOpened { .. }))
            .unwrap();
        assert!(is_revealing_board(&red_op[opened + 1]));
        assert_eq!(
            red_op[opened + 2],
            ServerMessage::GameOver { winner: Team::Blue }
        );
    }

    #[tokio::test]
    async fn observer_board_matches_idle_operative() {
        let mut table = Table::seated().await;
        let (observer, mut observer_io) = Connection::new();
        table.session.add_observer(observer.outbox()).await;
        let engine = table.begin().await;

        give_clue(&mut table, BLUE_SPY, "ocean", 1).await;
        await_guessing(&mut table, BLUE_OP, 2).await;
        let operative = table.seat(BLUE_OP.0, BLUE_OP.1);
        operative.guess(0, 0);
        operative.guess(2, 0);
        await_clue_request(&mut table, RED_SPY).await;

        let boards = |msgs: Vec<ServerMessage>| -> Vec<ServerMessage> {
            msgs.into_iter()
                .filter(|m| matches!(m, ServerMessage::Board { .. }))
                .collect()
        };
        let mut observed = Vec::new();
        while let Ok(msg) = observer_io.outgoing.try_recv() {
            observed.push(msg);
        }
        let observer_boards = boards(observed);
        let operative_boards = boards(table.seat_mut(RED_OP.0, RED_OP.1).drain());

        assert_eq!(observer_boards.len(), 2);
        assert_eq!(observer_boards, operative_boards);
        assert!(!observer_boards.iter().any(is_revealing_board));

        engine.abort();
    }

    #[tokio::test]
    async fn dropped_seat_abandons_the_session() {
        let mut table = Table::seated().await;
        let engine = table.begin().await;

        await_clue_request(&mut table, BLUE_SPY).await;
        table.drop_seat(BLUE_SPY.0, BLUE_SPY.1);

        await_engine(engine).await;
        let state = table.session.state.lock().await;
        assert_eq!(state.phase, Phase::Abandoned);
        assert_eq!(state.winner, None);
    }
}
