//! OpeningDatabase trait abstraction for lookup implementations

use crate::error::ExplorerResult;
use crate::filters::QueryFilters;
use async_trait::async_trait;
use chess::CandidateMove;
use cozy_chess::Board;

/// A move as reported by the opening database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseMove {
    /// Standard UCI notation; castling is written as the king's two-square step.
    pub uci: String,
    pub san: String,
    pub game_count: u64,
}

/// Opening-statistics provider
/// Implemented by both LichessExplorer and MockOpeningDatabase
#[async_trait]
pub trait OpeningDatabase: Send + Sync {
    /// Moves played from `fen` in reference games, already filtered.
    ///
    /// An empty list is a valid answer and means the database knows
    /// nothing useful about this position.
    async fn query(&self, fen: &str, filters: &QueryFilters) -> ExplorerResult<Vec<DatabaseMove>>;
}

/// Resolve database moves against `board`. Moves that are not legal in the
/// position are dropped.
pub fn to_candidates(board: &Board, moves: &[DatabaseMove]) -> Vec<CandidateMove> {
    let legal = chess::game::legal_moves(board);
    moves
        .iter()
        .filter_map(|m| {
            let Some(parsed) = chess::parse_uci_move(&m.uci) else {
                tracing::warn!("Unparseable database move: {}", m.uci);
                return None;
            };
            let mv = chess::convert_uci_castling_to_cozy(parsed, &legal);
            if legal.contains(&mv) {
                Some(CandidateMove::new(board, mv))
            } else {
                tracing::warn!("Database move {} is not legal here", m.uci);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_move(uci: &str, san: &str) -> DatabaseMove {
        DatabaseMove {
            uci: uci.into(),
            san: san.into(),
            game_count: 100,
        }
    }

    #[test]
    fn test_candidates_from_start() {
        let board = Board::default();
        let candidates = to_candidates(&board, &[db_move("e2e4", "e4"), db_move("g1f3", "Nf3")]);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].san, "e4");
        assert_eq!(candidates[1].san, "Nf3");
    }

    #[test]
    fn test_castling_is_converted() {
        let board = chess::parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let candidates = to_candidates(&board, &[db_move("e1g1", "O-O")]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].uci(), "e1h1");
        assert_eq!(candidates[0].san, "O-O");
    }

    #[test]
    fn test_illegal_and_garbage_dropped() {
        let board = Board::default();
        let candidates = to_candidates(&board, &[db_move("e2e5", "e5"), db_move("zz", "?")]);
        assert!(candidates.is_empty());
    }
}
