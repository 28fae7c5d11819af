use chess::{GameOverReason, PlayerColor};

use crate::arbiter::MoveSource;
use crate::ledger::{LedgerEntry, MoveOrigin};

/// Complete, immutable snapshot of session state.
/// Sent to subscribers on every state change and on subscribe.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Position under the cursor
    pub fen: String,
    pub start_fen: String,
    pub side_to_move: PlayerColor,
    pub human: PlayerColor,
    pub cursor: isize,
    pub reviewing: bool,
    pub history: Vec<MoveRecord>,
    pub mode: MoveSource,
    pub book_positions: Option<usize>,
    pub book_mark: Option<isize>,
    pub database_mark: Option<isize>,
    pub database_enabled: bool,
    pub evaluation: Option<f32>,
    pub engine_thinking: bool,
    pub elo: u16,
    pub game_over: Option<GameOverReason>,
}

impl SessionSnapshot {
    pub fn move_count(&self) -> usize {
        self.history.len()
    }

    pub fn is_human_turn(&self) -> bool {
        self.side_to_move == self.human
    }
}

/// A single move in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub san: String,
    pub uci: String,
    pub fen_after: String,
    pub origin: MoveOrigin,
}

impl From<&LedgerEntry> for MoveRecord {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            san: entry.san.clone(),
            uci: chess::format_uci_move(entry.mv),
            fen_after: entry.fen.clone(),
            origin: entry.origin,
        }
    }
}
