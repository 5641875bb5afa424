//! Word-list sources for board generation.

use std::collections::HashSet;
use std::path::PathBuf;

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::board::CELL_COUNT;
use crate::protocol::validate_wordlist_name;

/// Errors raised while fetching words for a new board.
#[derive(Debug, Error)]
pub enum WordSourceError {
    #[error("invalid word list name: {0}")]
    InvalidName(String),

    #[error("word list '{0}' not found")]
    NotFound(String),

    #[error("word list '{name}' is unreadable: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("word list has {found} distinct words, need {}", CELL_COUNT)]
    NotEnoughWords { found: usize },
}

/// Supplies the words for a board.
///
/// Implementations return at least [`CELL_COUNT`] distinct words for a
/// board; extra words are ignored by the generator.
pub trait BoardWordSource: Send + Sync {
    fn fetch_words(&self, list_name: &str) -> Result<Vec<String>, WordSourceError>;
}

/// Reads `<dir>/<name>.txt`, one word per line.
#[derive(Debug, Clone)]
pub struct FileWordSource {
    dir: PathBuf,
}

impl FileWordSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Names of the available lists, sorted.
    pub fn list_names(&self) -> Result<Vec<String>, std::io::Error> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let stem = name.strip_suffix(".txt")?;
                validate_wordlist_name(stem).ok()?;
                Some(stem.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

impl BoardWordSource for FileWordSource {
    fn fetch_words(&self, list_name: &str) -> Result<Vec<String>, WordSourceError> {
        validate_wordlist_name(list_name).map_err(WordSourceError::InvalidName)?;

        let path = self.dir.join(format!("{list_name}.txt"));
        let text = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                WordSourceError::NotFound(list_name.to_string())
            } else {
                WordSourceError::Unreadable {
                    name: list_name.to_string(),
                    source,
                }
            }
        })?;

        sample_words(&text, &mut rand::rng())
    }
}

/// Pick [`CELL_COUNT`] distinct words from a newline-separated list,
/// uniformly at random.
pub fn sample_words<R: Rng + ?Sized>(
    text: &str,
    rng: &mut R,
) -> Result<Vec<String>, WordSourceError> {
    let mut words = distinct_lines(text);
    if words.len() < CELL_COUNT {
        return Err(WordSourceError::NotEnoughWords { found: words.len() });
    }
    words.shuffle(rng);
    words.truncate(CELL_COUNT);
    Ok(words)
}

/// Trimmed, non-blank lines with duplicates removed, in file order.
fn distinct_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}
