//! Chooses where the opponent's next move comes from.
//!
//! Book and Database each carry an exhaustion mark: the ledger index at
//! which they last failed to produce a move at the live position. The
//! source mode is recomputed from those marks whenever the cursor moves, so
//! rewinding before a mark brings the source back.

use chess::{CandidateMove, OpeningTree};
use cozy_chess::Board;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{RngCore, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSource {
    Book,
    Database,
    Engine,
}

impl std::fmt::Display for MoveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Book => write!(f, "book"),
            Self::Database => write!(f, "database"),
            Self::Engine => write!(f, "engine"),
        }
    }
}

pub struct MoveSourceArbiter {
    book: Option<OpeningTree>,
    database_enabled: bool,
    mode: MoveSource,
    book_mark: Option<isize>,
    database_mark: Option<isize>,
    rng: Box<dyn RngCore + Send + Sync>,
}

impl std::fmt::Debug for MoveSourceArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveSourceArbiter")
            .field("book_positions", &self.book.as_ref().map(OpeningTree::len))
            .field("database_enabled", &self.database_enabled)
            .field("mode", &self.mode)
            .field("book_mark", &self.book_mark)
            .field("database_mark", &self.database_mark)
            .finish()
    }
}

impl MoveSourceArbiter {
    pub fn new(database_enabled: bool, rng: Box<dyn RngCore + Send + Sync>) -> Self {
        let mut arbiter = Self {
            book: None,
            database_enabled,
            mode: MoveSource::Engine,
            book_mark: None,
            database_mark: None,
            rng,
        };
        arbiter.recompute(-1);
        arbiter
    }

    /// Arbiter with a deterministic candidate picker.
    pub fn seeded(database_enabled: bool, seed: u64) -> Self {
        Self::new(database_enabled, Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn from_entropy(database_enabled: bool) -> Self {
        Self::new(database_enabled, Box::new(StdRng::from_os_rng()))
    }

    pub fn mode(&self) -> MoveSource {
        self.mode
    }

    pub fn book(&self) -> Option<&OpeningTree> {
        self.book.as_ref()
    }

    pub fn book_mark(&self) -> Option<isize> {
        self.book_mark
    }

    pub fn database_mark(&self) -> Option<isize> {
        self.database_mark
    }

    pub fn database_enabled(&self) -> bool {
        self.database_enabled
    }

    /// Replace the repertoire. Both marks are cleared.
    pub fn load_book(&mut self, tree: OpeningTree, cursor: isize) {
        tracing::info!(positions = tree.len(), "Opening book loaded");
        self.book = Some(tree);
        self.clear_marks();
        self.recompute(cursor);
    }

    pub fn clear_book(&mut self, cursor: isize) {
        self.book = None;
        self.book_mark = None;
        self.recompute(cursor);
    }

    pub fn set_database_enabled(&mut self, enabled: bool, cursor: isize) {
        self.database_enabled = enabled;
        self.recompute(cursor);
    }

    /// Forget both exhaustion marks, e.g. when the game restarts.
    pub fn clear_marks(&mut self) {
        self.book_mark = None;
        self.database_mark = None;
    }

    /// Derive the mode for a cursor position from the exhaustion marks.
    pub fn recompute(&mut self, cursor: isize) -> MoveSource {
        let before = |mark: Option<isize>| mark.is_none_or(|m| cursor < m);
        let mode = if self.book.is_some() && before(self.book_mark) {
            MoveSource::Book
        } else if self.database_enabled && before(self.database_mark) {
            MoveSource::Database
        } else {
            MoveSource::Engine
        };
        if mode != self.mode {
            tracing::debug!(%mode, cursor, "Move source changed");
        }
        self.mode = mode;
        mode
    }

    /// Pick a repertoire move for `board`, the live position at ledger
    /// index `index`. A miss marks the book exhausted at `index` and forces
    /// the engine.
    pub fn book_move(&mut self, board: &Board, index: isize) -> Option<CandidateMove> {
        let candidates = self
            .book
            .as_ref()
            .and_then(|tree| tree.candidates_for(board))
            .unwrap_or(&[]);
        match candidates.choose(&mut *self.rng) {
            Some(choice) => {
                tracing::debug!(san = %choice.san, of = candidates.len(), "Book move");
                Some(choice.clone())
            }
            None => {
                tracing::info!(index, "Book exhausted");
                self.book_mark = Some(index);
                self.mode = MoveSource::Engine;
                None
            }
        }
    }

    /// Pick uniformly among database candidates. An empty set marks the
    /// database exhausted at `index`.
    pub fn database_move(
        &mut self,
        candidates: &[CandidateMove],
        index: isize,
    ) -> Option<CandidateMove> {
        match candidates.choose(&mut *self.rng) {
            Some(choice) => Some(choice.clone()),
            None => {
                self.database_exhausted(index);
                None
            }
        }
    }

    /// The database failed, was rate limited or had nothing at `index`.
    pub fn database_exhausted(&mut self, index: isize) {
        tracing::info!(index, "Database exhausted");
        self.database_mark = Some(index);
        self.mode = MoveSource::Engine;
    }

    /// A sourced move was rejected by the rules engine.
    pub fn force_engine(&mut self) {
        tracing::warn!("Forcing engine after rejected move");
        self.mode = MoveSource::Engine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::compile;
    use proptest::prelude::*;

    fn after(sans: &[&str]) -> Board {
        let mut game = chess::Game::new();
        for san in sans {
            game.apply_san(san).unwrap();
        }
        game.position().clone()
    }

    fn book(pgn: &str) -> OpeningTree {
        compile(pgn).unwrap()
    }

    #[test]
    fn test_initial_mode() {
        assert_eq!(MoveSourceArbiter::seeded(true, 1).mode(), MoveSource::Database);
        assert_eq!(MoveSourceArbiter::seeded(false, 1).mode(), MoveSource::Engine);

        let mut arbiter = MoveSourceArbiter::seeded(true, 1);
        arbiter.load_book(book("1. e4 e5"), -1);
        assert_eq!(arbiter.mode(), MoveSource::Book);
    }

    #[test]
    fn test_single_candidate_is_deterministic() {
        let mut arbiter = MoveSourceArbiter::seeded(false, 7);
        arbiter.load_book(book("1. e4 e5"), -1);
        let pick = arbiter.book_move(&after(&["e4"]), 0).unwrap();
        assert_eq!(pick.san, "e5");
        assert_eq!(arbiter.mode(), MoveSource::Book);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let tree = book("1. e4 (1. d4) (1. c4) (1. Nf3) *");
        let mut a = MoveSourceArbiter::seeded(false, 42);
        let mut b = MoveSourceArbiter::seeded(false, 42);
        a.load_book(tree.clone(), -1);
        b.load_book(tree, -1);
        for _ in 0..8 {
            let x = a.book_move(&Board::default(), -1).unwrap();
            let y = b.book_move(&Board::default(), -1).unwrap();
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_book_miss_then_database() {
        let mut arbiter = MoveSourceArbiter::seeded(true, 1);
        arbiter.load_book(book("1. e4 e5"), -1);

        // 1. e4 e5 2. Nf3 and the book has nothing for Black
        assert!(arbiter.book_move(&after(&["e4", "e5", "Nf3"]), 2).is_none());
        assert_eq!(arbiter.mode(), MoveSource::Engine);
        assert_eq!(arbiter.book_mark(), Some(2));

        // Next live position: book is past its mark, database takes over
        assert_eq!(arbiter.recompute(4), MoveSource::Database);
        arbiter.database_exhausted(4);
        assert_eq!(arbiter.recompute(6), MoveSource::Engine);

        // Rewinding before either mark restores the sources
        assert_eq!(arbiter.recompute(3), MoveSource::Database);
        assert_eq!(arbiter.recompute(1), MoveSource::Book);
    }

    #[test]
    fn test_database_move_empty_marks() {
        let mut arbiter = MoveSourceArbiter::seeded(true, 1);
        assert!(arbiter.database_move(&[], 5).is_none());
        assert_eq!(arbiter.database_mark(), Some(5));
        assert_eq!(arbiter.mode(), MoveSource::Engine);
    }

    #[test]
    fn test_load_book_clears_marks() {
        let mut arbiter = MoveSourceArbiter::seeded(true, 1);
        arbiter.database_exhausted(0);
        arbiter.load_book(book("1. d4"), 3);
        assert_eq!(arbiter.database_mark(), None);
        assert_eq!(arbiter.mode(), MoveSource::Book);

        arbiter.clear_book(3);
        assert_eq!(arbiter.mode(), MoveSource::Database);
    }

    #[test]
    fn test_force_engine() {
        let mut arbiter = MoveSourceArbiter::seeded(true, 1);
        arbiter.force_engine();
        assert_eq!(arbiter.mode(), MoveSource::Engine);
        // Marks untouched, so moving the cursor brings the database back
        assert_eq!(arbiter.recompute(0), MoveSource::Database);
    }

    proptest! {
        #[test]
        fn prop_book_mark_governs_mode(k in 0isize..40, cursor in -1isize..60) {
            let mut arbiter = MoveSourceArbiter::seeded(false, 3);
            arbiter.load_book(book("1. e4 e5"), -1);
            // Any position the book does not know
            prop_assert!(arbiter.book_move(&after(&["d4"]), k).is_none());
            prop_assert_eq!(arbiter.mode(), MoveSource::Engine);
            prop_assert_eq!(arbiter.book_mark(), Some(k));

            let mode = arbiter.recompute(cursor);
            if cursor < k {
                prop_assert_eq!(mode, MoveSource::Book);
            } else {
                prop_assert_eq!(mode, MoveSource::Engine);
            }
        }
    }
}
