use cozy_chess::{Board, Color, GameStatus, Move, Piece, Square};
use serde::{Deserialize, Serialize};

use crate::fen::{format_fen, parse_fen, FenError};
use crate::pgn::san::{format_san, parse_san, SanError};

/// Rules-engine wrapper around a cozy-chess [`Board`].
///
/// Holds only the current position; move history lives with the caller.
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
}

/// Starting position of a game or of a compiled opening tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPosition {
    #[default]
    Standard,
    Fen(String),
}

impl StartPosition {
    pub fn board(&self) -> Result<Board, FenError> {
        match self {
            Self::Standard => Ok(Board::default()),
            Self::Fen(fen) => parse_fen(fen),
        }
    }

    pub fn fen(&self) -> String {
        match self {
            Self::Standard => format_fen(&Board::default()),
            Self::Fen(fen) => fen.clone(),
        }
    }
}

/// A move that the rules engine accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub mv: Move,
    pub san: String,
    /// FEN after this move
    pub fen: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    Checkmate { winner: PlayerColor },
    Stalemate,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    White,
    Black,
}

impl From<Color> for PlayerColor {
    fn from(c: Color) -> Self {
        match c {
            Color::White => Self::White,
            Color::Black => Self::Black,
        }
    }
}

impl From<PlayerColor> for Color {
    fn from(c: PlayerColor) -> Self {
        match c {
            PlayerColor::White => Self::White,
            PlayerColor::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkmate { winner } => write!(f, "Checkmate! {:?} wins.", winner),
            Self::Stalemate => write!(f, "Draw by stalemate."),
            Self::Draw => write!(f, "Draw!"),
        }
    }
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self {
            position: Board::default(),
        }
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        Ok(Self {
            position: parse_fen(fen)?,
        })
    }

    pub fn from_board(position: Board) -> Self {
        Self { position }
    }

    /// Replace the current position. The old position is kept on error.
    pub fn load_position(&mut self, fen: &str) -> Result<(), GameError> {
        self.position = parse_fen(fen)?;
        Ok(())
    }

    pub fn set_board(&mut self, position: Board) {
        self.position = position;
    }

    /// Get the current board position
    pub fn position(&self) -> &Board {
        &self.position
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        format_fen(&self.position)
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    /// Get all legal moves for the current position
    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.position)
    }

    /// Legal moves of the piece standing on `from`.
    pub fn legal_moves_from(&self, from: Square) -> Vec<Move> {
        self.legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from)
            .collect()
    }

    /// True when moving `from` → `to` needs a promotion choice.
    pub fn is_promotion(&self, from: Square, to: Square) -> bool {
        self.legal_moves()
            .iter()
            .any(|mv| mv.from == from && mv.to == to && mv.promotion.is_some())
    }

    /// Apply a move after validating it against the legal move list.
    pub fn apply_move(&mut self, mv: Move) -> Result<AppliedMove, GameError> {
        if !self.legal_moves().contains(&mv) {
            return Err(GameError::IllegalMove(chess_common::format_uci_move(mv)));
        }

        let san = format_san(&self.position, mv);
        self.position.play_unchecked(mv);

        Ok(AppliedMove {
            mv,
            san,
            fen: self.to_fen(),
        })
    }

    /// Apply a move written in SAN.
    pub fn apply_san(&mut self, san: &str) -> Result<AppliedMove, GameError> {
        let mv = parse_san(&self.position, san)?;
        self.apply_move(mv)
    }

    /// Apply a move written in UCI, accepting both `e1g1` and `e1h1` castling.
    pub fn apply_uci(&mut self, uci: &str) -> Result<AppliedMove, GameError> {
        let mv = chess_common::parse_uci_move(uci)
            .ok_or_else(|| GameError::IllegalMove(uci.to_string()))?;
        let mv = chess_common::convert_uci_castling_to_cozy(mv, &self.legal_moves());
        self.apply_move(mv)
    }

    /// Why the game is over, if it is.
    pub fn game_over(&self) -> Option<GameOverReason> {
        match self.position.status() {
            GameStatus::Ongoing => None,
            GameStatus::Won => Some(GameOverReason::Checkmate {
                winner: PlayerColor::from(!self.position.side_to_move()),
            }),
            GameStatus::Drawn if self.position.checkers().is_empty() && self.legal_moves().is_empty() => {
                Some(GameOverReason::Stalemate)
            }
            GameStatus::Drawn => Some(GameOverReason::Draw),
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect every legal move of `board`.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

/// Whether `mv` is a castling move in cozy-chess encoding (king takes own rook).
pub fn is_castling(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move())
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("FEN parse error: {0}")]
    FenError(#[from] FenError),
    #[error("SAN parse error: {0}")]
    SanError(#[from] SanError),
}
