//! Configuration for bookmate
//!
//! Every setting has a compiled-in default that a `BOOKMATE_*` environment
//! variable can override. Command-line flags override both.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use engine::Strength;
use explorer::{QueryFilters, DEFAULT_EXPLORER_URL};

const DEFAULT_OPPONENT_DELAY_MS: u64 = 300;

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", name, raw);
            None
        }
    }
}

/// Stockfish binary from BOOKMATE_STOCKFISH_PATH, if set.
///
/// When unset the engine crate searches the usual install locations.
pub fn get_stockfish_path() -> Option<PathBuf> {
    std::env::var_os("BOOKMATE_STOCKFISH_PATH").map(PathBuf::from)
}

pub fn get_strength() -> Strength {
    env_parse("BOOKMATE_ELO")
        .map(Strength::from_elo)
        .unwrap_or_default()
}

pub fn get_explorer_url() -> String {
    std::env::var("BOOKMATE_EXPLORER_URL").unwrap_or_else(|_| DEFAULT_EXPLORER_URL.to_string())
}

/// Bearer token for the explorer, from BOOKMATE_EXPLORER_TOKEN.
pub fn get_explorer_token() -> Option<String> {
    std::env::var("BOOKMATE_EXPLORER_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
}

pub fn get_query_filters() -> QueryFilters {
    let defaults = QueryFilters::default();
    QueryFilters {
        max_moves: env_parse("BOOKMATE_MAX_MOVES").unwrap_or(defaults.max_moves),
        min_games: env_parse("BOOKMATE_MIN_GAMES").unwrap_or(defaults.min_games),
        min_percent_share: env_parse("BOOKMATE_MIN_PERCENT").unwrap_or(defaults.min_percent_share),
        rating_min: None,
        rating_max: None,
    }
}

/// Pause before the opponent answers a move.
pub fn get_opponent_delay() -> Duration {
    Duration::from_millis(
        env_parse("BOOKMATE_OPPONENT_DELAY_MS").unwrap_or(DEFAULT_OPPONENT_DELAY_MS),
    )
}

/// BOOKMATE_DATABASE=off (or 0/false/no) disables the opening database.
pub fn database_enabled() -> bool {
    match std::env::var("BOOKMATE_DATABASE") {
        Ok(value) => !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => true,
    }
}
