//! Server configuration from environment variables.
//!
//! | Variable       | Default        | Meaning                              |
//! |----------------|----------------|--------------------------------------|
//! | `PORT`         | `8080`         | TCP port to listen on                |
//! | `STATIC_DIR`   | `./dist`       | Front-end build output to serve      |
//! | `WORDLIST_DIR` | `./wordlists`  | Directory of `<name>.txt` word lists |

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: String,
    pub wordlist_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or unparsable values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "./dist".to_string());
        let wordlist_dir = lookup("WORDLIST_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./wordlists"));
        Self {
            port,
            static_dir,
            wordlist_dir,
        }
    }
}
