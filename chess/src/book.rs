//! Opening tree: PGN repertoire compiled into a position-indexed move table.

use std::collections::HashMap;

use cozy_chess::{Board, Move, Piece, Square};
use smallvec::SmallVec;

use crate::fen::{parse_fen, PositionKey};
use crate::game::StartPosition;
use crate::pgn::san::{format_san, parse_san};
use crate::pgn::{parse_pgn, PgnError, PgnMove};

/// A move that can be replayed against the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMove {
    pub san: String,
    pub mv: Move,
}

impl CandidateMove {
    pub fn new(board: &Board, mv: Move) -> Self {
        Self {
            san: format_san(board, mv),
            mv,
        }
    }

    pub fn from(&self) -> Square {
        self.mv.from
    }

    pub fn to(&self) -> Square {
        self.mv.to
    }

    pub fn promotion(&self) -> Option<Piece> {
        self.mv.promotion
    }

    pub fn uci(&self) -> String {
        chess_common::format_uci_move(self.mv)
    }
}

type Candidates = SmallVec<[CandidateMove; 2]>;

/// Position key → candidate moves seen in the loaded repertoire.
///
/// Immutable once compiled; a new document replaces the whole tree.
#[derive(Debug, Clone, Default)]
pub struct OpeningTree {
    entries: HashMap<PositionKey, Candidates>,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Starting position for games without a `FEN` tag.
    pub baseline: StartPosition,
}

/// Compile a PGN document starting every game from the standard position.
pub fn compile(pgn: &str) -> Result<OpeningTree, BookError> {
    compile_with(pgn, &CompileOptions::default())
}

pub fn compile_with(pgn: &str, options: &CompileOptions) -> Result<OpeningTree, BookError> {
    let games = parse_pgn(pgn)?;
    let baseline = options.baseline.board()?;
    let mut tree = OpeningTree::default();

    for (index, game) in games.iter().enumerate() {
        let start = match game.starting_fen() {
            Some(fen) => match parse_fen(fen) {
                Ok(board) => board,
                Err(e) => {
                    tracing::warn!(game = index, "Skipping game with invalid FEN tag: {}", e);
                    continue;
                }
            },
            None => baseline.clone(),
        };
        tree.walk_line(&game.moves, start);
    }

    if tree.is_empty() {
        return Err(BookError::EmptyTree);
    }

    tracing::info!(
        positions = tree.len(),
        moves = tree.move_count(),
        games = games.len(),
        "Compiled opening tree"
    );
    Ok(tree)
}

impl OpeningTree {
    /// Candidate moves for a position, if the repertoire covers it.
    pub fn get(&self, key: &PositionKey) -> Option<&[CandidateMove]> {
        self.entries
            .get(key)
            .filter(|c| !c.is_empty())
            .map(|c| c.as_slice())
    }

    pub fn candidates_for(&self, board: &Board) -> Option<&[CandidateMove]> {
        self.get(&PositionKey::from_board(board))
    }

    pub fn contains(&self, key: &PositionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct (position, move) pairs.
    pub fn move_count(&self) -> usize {
        self.entries.values().map(|c| c.len()).sum()
    }

    fn insert(&mut self, key: PositionKey, candidate: CandidateMove) {
        let slot = self.entries.entry(key).or_default();
        if !slot.iter().any(|c| c.mv == candidate.mv) {
            slot.push(candidate);
        }
    }

    /// Record every ply of `line`, replaying it from `start`. Variations are
    /// siblings of the ply they hang off and start from the same position.
    /// A move that does not resolve ends this line only.
    fn walk_line(&mut self, line: &[PgnMove], start: Board) {
        let mut board = start;
        for ply in line {
            for variation in &ply.variations {
                self.walk_line(variation, board.clone());
            }

            let mv = match parse_san(&board, &ply.san) {
                Ok(mv) => mv,
                Err(e) => {
                    tracing::debug!("Stopping line at '{}': {}", ply.san, e);
                    break;
                }
            };
            self.insert(PositionKey::from_board(&board), CandidateMove::new(&board, mv));
            board.play_unchecked(mv);
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookError {
    #[error("Could not parse opening document: {0}")]
    Parse(#[from] PgnError),
    #[error("Opening document contains no playable positions")]
    EmptyTree,
    #[error("Invalid baseline position: {0}")]
    Baseline(#[from] crate::fen::FenError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;

    const REPERTOIRE: &str = "1. e4 e5 2. Nf3 Nc6 (2... Nf6 3. Nxe5 d5 4. exd5 (4. d4 dxe4 5. c4) (4. Nc3 d4) 4... Nxd5 ) 3. Bb5";

    fn sans(tree: &OpeningTree, board: &Board) -> Vec<String> {
        let mut out: Vec<String> = tree
            .candidates_for(board)
            .unwrap_or_default()
            .iter()
            .map(|c| c.san.clone())
            .collect();
        out.sort();
        out
    }

    fn after(moves: &[&str]) -> Board {
        let mut game = Game::new();
        for san in moves {
            game.apply_san(san).unwrap();
        }
        game.position().clone()
    }

    #[test]
    fn test_start_position_is_keyed() {
        let tree = compile("1. e4 e5").unwrap();
        assert_eq!(sans(&tree, &Board::default()), vec!["e4"]);
        assert_eq!(sans(&tree, &after(&["e4"])), vec!["e5"]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_variations_branch_from_same_position() {
        let tree = compile(REPERTOIRE).unwrap();
        assert_eq!(sans(&tree, &after(&["e4", "e5", "Nf3"])), vec!["Nc6", "Nf6"]);
        assert_eq!(
            sans(&tree, &after(&["e4", "e5", "Nf3", "Nf6", "Nxe5", "d5"])),
            vec!["Nc3", "d4", "exd5"]
        );
        assert_eq!(sans(&tree, &after(&["e4", "e5", "Nf3", "Nc6"])), vec!["Bb5"]);
    }

    #[test]
    fn test_duplicates_collapse_across_games() {
        let tree = compile("1. e4 e5 *\n\n1. e4 c5 *\n\n1. d4 *").unwrap();
        assert_eq!(sans(&tree, &Board::default()), vec!["d4", "e4"]);
        assert_eq!(sans(&tree, &after(&["e4"])), vec!["c5", "e5"]);
    }

    #[test]
    fn test_bad_branch_keeps_recorded_positions() {
        // Qh5 is fine, "Qxf9" is not a move.
        let tree = compile("1. e4 e5 2. Qh5 Qxf9 3. Bc4").unwrap();
        assert_eq!(sans(&tree, &after(&["e4", "e5"])), vec!["Qh5"]);
        assert!(tree.candidates_for(&after(&["e4", "e5", "Qh5"])).is_none());
    }

    #[test]
    fn test_transpositions_share_key() {
        let tree = compile("1. Nf3 Nf6 2. d4 *\n\n1. d4 Nf6 2. Nf3 e6 *").unwrap();
        // Both orders reach the same position after 2 plies of white + 1 of black.
        let a = after(&["Nf3", "Nf6", "d4"]);
        let b = after(&["d4", "Nf6", "Nf3"]);
        assert_eq!(PositionKey::from_board(&a), PositionKey::from_board(&b));
        assert_eq!(sans(&tree, &a), vec!["e6"]);
    }

    #[test]
    fn test_fen_tag_and_baseline() {
        let pgn = "[FEN \"4k3/8/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. Kd2 Kd7 *";
        let tree = compile(pgn).unwrap();
        let start = parse_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(sans(&tree, &start), vec!["Kd2"]);

        let options = CompileOptions {
            baseline: StartPosition::Fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1".to_string()),
        };
        let tree = compile_with("1. Ke2 *", &options).unwrap();
        assert_eq!(sans(&tree, &start), vec!["Ke2"]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(compile("{nothing here}"), Err(BookError::Parse(_))));
        assert!(matches!(compile("1. e5 e4"), Err(BookError::EmptyTree)));
    }
}
