pub mod analysis;
pub mod book;
pub mod fen;
pub mod game;
pub mod pgn;

pub use analysis::{AnalysisScore, EngineAnalysis, MATE_EVALUATION};
pub use book::{compile, compile_with, BookError, CandidateMove, CompileOptions, OpeningTree};
pub use chess_common::{
    convert_uci_castling_to_cozy, format_color, format_square, format_uci_move, parse_square,
    parse_uci_move,
};
pub use fen::{format_fen, parse_fen, FenError, PositionKey};
pub use game::{AppliedMove, Game, GameError, GameOverReason, PlayerColor, StartPosition};
pub use pgn::{parse_pgn, PgnError, PgnGame};
