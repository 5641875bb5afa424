//! The 5×5 word grid.
//!
//! # Examples
//!
//! ```
//! use codenames_core::board::{Board, CELL_COUNT};
//! use codenames_core::protocol::{CardColor, Team};
//!
//! let words: Vec<String> = (0..CELL_COUNT).map(|i| format!("w{i}")).collect();
//! let board = Board::from_words(words, Team::Blue, &mut rand::rng()).unwrap();
//! assert_eq!(board.count(CardColor::Blue), 9);
//! assert_eq!(board.count(CardColor::Black), 1);
//! ```

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::protocol::{CardColor, CellView, Team};
use crate::words::{BoardWordSource, WordSourceError};

/// Cells per row and per column.
pub const SIZE: usize = 5;

/// Cells on a board.
pub const CELL_COUNT: usize = SIZE * SIZE;

/// Cells of the team that acts first.
pub const STARTING_TEAM_WORDS: usize = 9;

/// Cells of the team that acts second.
pub const SECOND_TEAM_WORDS: usize = 8;

/// Neutral cells.
pub const WHITE_WORDS: usize = 7;

/// One board cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub word: String,
    pub color: CardColor,
    pub open: bool,
}

impl Cell {
    pub fn new(word: impl Into<String>, color: CardColor) -> Self {
        Self {
            word: word.into(),
            color,
            open: false,
        }
    }

    /// How this cell looks to a viewer that may (`reveal`) or may not see
    /// hidden colors. Open cells always show their color.
    pub fn view(&self, reveal: bool) -> CellView {
        CellView {
            word: self.word.clone(),
            color: (reveal || self.open).then_some(self.color),
            open: self.open,
        }
    }
}

/// A 5×5 grid of cells, stored row-major.
///
/// Words are unique, exactly one cell is Black, and an opened cell never
/// closes again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    /// Fetch words from `source` and lay out a fresh board.
    pub fn generate<R: Rng + ?Sized>(
        source: &dyn BoardWordSource,
        list_name: &str,
        starting: Team,
        rng: &mut R,
    ) -> Result<Self, WordSourceError> {
        let words = source.fetch_words(list_name)?;
        Self::from_words(words, starting, rng)
    }

    /// Lay out a board from the first 25 distinct `words`.
    ///
    /// Colors are shuffled over grid positions, and words are placed on a
    /// second, independent shuffle of positions, so neither order says
    /// anything about the other.
    pub fn from_words<R: Rng + ?Sized>(
        words: Vec<String>,
        starting: Team,
        rng: &mut R,
    ) -> Result<Self, WordSourceError> {
        let mut seen = HashSet::new();
        let words: Vec<String> = words
            .into_iter()
            .filter(|w| seen.insert(w.clone()))
            .take(CELL_COUNT)
            .collect();
        if words.len() < CELL_COUNT {
            return Err(WordSourceError::NotEnoughWords { found: words.len() });
        }

        let mut colors = color_deck(starting);
        colors.shuffle(rng);

        let mut positions: Vec<usize> = (0..CELL_COUNT).collect();
        positions.shuffle(rng);

        let mut placed: Vec<Option<String>> = vec![None; CELL_COUNT];
        for (word, pos) in words.into_iter().zip(positions) {
            placed[pos] = Some(word);
        }

        let cells = placed
            .into_iter()
            .zip(colors)
            .map(|(word, color)| Cell::new(word.unwrap_or_default(), color))
            .collect();
        Ok(Self { cells })
    }

    /// Build a board from a fixed row-major layout.
    ///
    /// Returns `None` unless the layout has 25 cells with distinct words and
    /// the standard colors: 9 and 8 for the two teams, 7 White, 1 Black.
    pub fn from_cells(cells: Vec<Cell>) -> Option<Self> {
        if cells.len() != CELL_COUNT {
            return None;
        }
        let distinct: HashSet<&str> = cells.iter().map(|c| c.word.as_str()).collect();
        if distinct.len() != CELL_COUNT {
            return None;
        }
        let board = Self { cells };
        let teams = [board.count(CardColor::Blue), board.count(CardColor::Red)];
        let team_split = teams == [STARTING_TEAM_WORDS, SECOND_TEAM_WORDS]
            || teams == [SECOND_TEAM_WORDS, STARTING_TEAM_WORDS];
        if !team_split
            || board.count(CardColor::White) != WHITE_WORDS
            || board.count(CardColor::Black) != 1
        {
            return None;
        }
        Some(board)
    }

    /// The cell at `(row, col)`, or `None` when out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= SIZE || col >= SIZE {
            return None;
        }
        self.cells.get(row * SIZE + col)
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        if row >= SIZE || col >= SIZE {
            return None;
        }
        self.cells.get_mut(row * SIZE + col)
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of cells with the given color.
    pub fn count(&self, color: CardColor) -> usize {
        self.cells.iter().filter(|c| c.color == color).count()
    }

    /// The grid as seen by one viewer, row by row.
    pub fn view(&self, reveal: bool) -> Vec<Vec<CellView>> {
        self.cells
            .chunks(SIZE)
            .map(|row| row.iter().map(|c| c.view(reveal)).collect())
            .collect()
    }
}

/// The fixed color multiset: 9 for the starting team, 8 for the other,
/// 7 White, 1 Black.
fn color_deck(starting: Team) -> Vec<CardColor> {
    let mut colors = Vec::with_capacity(CELL_COUNT);
    colors.extend(std::iter::repeat_n(starting.color(), STARTING_TEAM_WORDS));
    colors.extend(std::iter::repeat_n(
        starting.opponent().color(),
        SECOND_TEAM_WORDS,
    ));
    colors.extend(std::iter::repeat_n(CardColor::White, WHITE_WORDS));
    colors.push(CardColor::Black);
    colors
}
