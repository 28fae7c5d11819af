//! FEN handling and the position key used for every book lookup.

use cozy_chess::Board;

/// Number of leading FEN fields that make up a [`PositionKey`]:
/// placement, side to move, castling rights.
pub const KEY_FIELDS: usize = 3;

/// Separator between the retained FEN fields.
pub const KEY_SEPARATOR: &str = " ";

/// Canonical lookup key for a position.
///
/// Two positions that differ only in the en-passant target or the move
/// counters share a key. Every component that stores or probes positions
/// (opening tree, explorer cache, arbiter) must build keys through this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey(String);

impl PositionKey {
    /// Derive the key from a FEN string. Never fails; missing fields are
    /// simply absent from the key.
    pub fn from_fen(fen: &str) -> Self {
        let key = fen
            .split_whitespace()
            .take(KEY_FIELDS)
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);
        Self(key)
    }

    pub fn from_board(board: &Board) -> Self {
        Self::from_fen(&format_fen(board))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let trimmed = fen.trim();
    if trimmed.is_empty() {
        return Err(FenError::InvalidFormat);
    }

    Board::from_fen(trimmed, false).map_err(|_| FenError::InvalidBoardLayout(trimmed.to_string()))
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout: {0}")]
    InvalidBoardLayout(String),
}
