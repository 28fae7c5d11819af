//! Position history with a review cursor.
//!
//! The cursor ranges over `-1..=last_index()`, where `-1` is the recorded
//! start position. "Live" means the cursor sits on the last entry and the
//! user is not reviewing; only a live position may be answered by the
//! opponent.

use cozy_chess::Move;

/// Who produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOrigin {
    Human,
    Book,
    Database,
    Engine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub mv: Move,
    pub san: String,
    /// FEN after the move
    pub fen: String,
    pub origin: MoveOrigin,
}

/// Where the cursor ended up after a navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub cursor: isize,
    pub reviewing: bool,
    /// The call moved the cursor back onto the live position.
    pub reached_live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange { index: isize, len: usize },
}

/// Plies moved by a single step back or forward.
pub const STEP_PLIES: isize = 2;

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    start_fen: String,
    entries: Vec<LedgerEntry>,
    cursor: isize,
    reviewing: bool,
}

impl HistoryLedger {
    pub fn new(start_fen: impl Into<String>) -> Self {
        Self {
            start_fen: start_fen.into(),
            entries: Vec::new(),
            cursor: -1,
            reviewing: false,
        }
    }

    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn last_index(&self) -> isize {
        self.entries.len() as isize - 1
    }

    pub fn is_reviewing(&self) -> bool {
        self.reviewing
    }

    pub fn is_live(&self) -> bool {
        !self.reviewing
    }

    /// Entry under the cursor, `None` at the start position.
    pub fn current(&self) -> Option<&LedgerEntry> {
        usize::try_from(self.cursor)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    /// FEN of the position under the cursor.
    pub fn current_fen(&self) -> &str {
        self.current().map_or(self.start_fen.as_str(), |e| e.fen.as_str())
    }

    /// Moves from the start position up to and including the cursor.
    pub fn moves_to_cursor(&self) -> Vec<Move> {
        let upto = (self.cursor + 1) as usize;
        self.entries[..upto].iter().map(|e| e.mv).collect()
    }

    /// Flag the ledger as reviewing ahead of a navigation, so that output
    /// of searches issued earlier is suppressed while the cursor moves.
    pub fn mark_reviewing(&mut self) {
        self.reviewing = true;
    }

    /// Record a move at the cursor. While reviewing, everything after the
    /// cursor is discarded first. Returns the new (live) cursor.
    pub fn append(&mut self, entry: LedgerEntry) -> isize {
        if self.reviewing {
            self.entries.truncate((self.cursor + 1) as usize);
        }
        self.entries.push(entry);
        self.cursor = self.last_index();
        self.reviewing = false;
        self.cursor
    }

    pub fn step_back(&mut self) -> Navigation {
        if self.cursor == -1 {
            return self.navigation(false);
        }
        self.cursor = (self.cursor - STEP_PLIES).max(-1);
        self.reviewing = true;
        self.navigation(false)
    }

    pub fn step_forward(&mut self) -> Navigation {
        if !self.reviewing {
            return self.navigation(false);
        }
        let last = self.last_index();
        self.cursor = (self.cursor + STEP_PLIES).min(last);
        let reached_live = self.cursor == last;
        self.reviewing = !reached_live;
        self.navigation(reached_live)
    }

    pub fn jump_to(&mut self, index: isize) -> Result<Navigation, LedgerError> {
        if index < -1 || index > self.last_index() {
            return Err(LedgerError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let was_reviewing = self.reviewing;
        self.cursor = index;
        self.reviewing = index < self.last_index();
        Ok(self.navigation(was_reviewing && !self.reviewing))
    }

    /// Drop all entries and start over from `start_fen`.
    pub fn reset(&mut self, start_fen: impl Into<String>) {
        self.start_fen = start_fen.into();
        self.entries.clear();
        self.cursor = -1;
        self.reviewing = false;
    }

    fn navigation(&self, reached_live: bool) -> Navigation {
        Navigation {
            cursor: self.cursor,
            reviewing: self.reviewing,
            reached_live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Game;
    use proptest::prelude::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Ledger holding the first `n` plies of a fixed knight shuffle.
    fn ledger_with(n: usize) -> HistoryLedger {
        let shuffle = ["Nf3", "Nf6", "Ng1", "Ng8"];
        let mut game = Game::new();
        let mut ledger = HistoryLedger::new(START);
        for i in 0..n {
            let applied = game.apply_san(shuffle[i % shuffle.len()]).unwrap();
            ledger.append(LedgerEntry {
                mv: applied.mv,
                san: applied.san,
                fen: applied.fen,
                origin: MoveOrigin::Human,
            });
        }
        ledger
    }

    fn entry(san: &str) -> LedgerEntry {
        let mut game = Game::new();
        let applied = game.apply_san(san).unwrap();
        LedgerEntry {
            mv: applied.mv,
            san: applied.san,
            fen: applied.fen,
            origin: MoveOrigin::Human,
        }
    }

    #[test]
    fn test_empty_ledger() {
        let mut ledger = HistoryLedger::new(START);
        assert_eq!(ledger.cursor(), -1);
        assert!(ledger.is_live());
        assert_eq!(ledger.current_fen(), START);
        let nav = ledger.step_back();
        assert_eq!(nav.cursor, -1);
        assert!(!nav.reviewing);
        assert!(ledger.moves_to_cursor().is_empty());
    }

    #[test]
    fn test_step_back_by_two_plies() {
        let mut ledger = ledger_with(5);
        assert_eq!(ledger.cursor(), 4);

        let nav = ledger.step_back();
        assert_eq!(nav.cursor, 2);
        assert!(nav.reviewing);

        ledger.step_back();
        let nav = ledger.step_back();
        assert_eq!(nav.cursor, -1);
        assert_eq!(ledger.current_fen(), START);

        // No-op at the start
        assert_eq!(ledger.step_back().cursor, -1);
        assert!(ledger.is_reviewing());
    }

    #[test]
    fn test_step_forward_clamps_and_goes_live() {
        let mut ledger = ledger_with(4);
        ledger.jump_to(0).unwrap();

        let nav = ledger.step_forward();
        assert_eq!(nav.cursor, 2);
        assert!(nav.reviewing);
        assert!(!nav.reached_live);

        let nav = ledger.step_forward();
        assert_eq!(nav.cursor, 3);
        assert!(!nav.reviewing);
        assert!(nav.reached_live);

        // Already live
        let nav = ledger.step_forward();
        assert_eq!(nav.cursor, 3);
        assert!(!nav.reached_live);
    }

    #[test]
    fn test_jump_to() {
        let mut ledger = ledger_with(3);
        let nav = ledger.jump_to(1).unwrap();
        assert!(nav.reviewing);
        assert_eq!(ledger.moves_to_cursor().len(), 2);

        let nav = ledger.jump_to(2).unwrap();
        assert!(!nav.reviewing);
        assert!(nav.reached_live);

        assert_eq!(
            ledger.jump_to(3),
            Err(LedgerError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert!(ledger.jump_to(-2).is_err());
        assert!(ledger.jump_to(-1).unwrap().reviewing);
    }

    #[test]
    fn test_append_while_reviewing_truncates() {
        let mut ledger = ledger_with(4);
        ledger.jump_to(-1).unwrap();
        let cursor = ledger.append(entry("e4"));
        assert_eq!(cursor, 0);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_live());
        assert_eq!(ledger.entries()[0].san, "e4");
    }

    #[test]
    fn test_reset() {
        let mut ledger = ledger_with(3);
        ledger.step_back();
        ledger.reset("8/8/8/8/8/8/k7/7K w - - 0 1");
        assert!(ledger.is_empty());
        assert_eq!(ledger.cursor(), -1);
        assert!(ledger.is_live());
        assert_eq!(ledger.current_fen(), "8/8/8/8/8/8/k7/7K w - - 0 1");
    }

    proptest! {
        #[test]
        fn prop_append_while_reviewing_truncates(n in 1usize..12, back in -1isize..11) {
            let mut ledger = ledger_with(n);
            let target = back.min(n as isize - 1);
            ledger.jump_to(target).unwrap();
            let reviewing = ledger.is_reviewing();

            // The entry that used to follow the cursor is legal there.
            let replay = ledger_with(n).entries().get((target + 1) as usize).cloned();
            if let Some(next) = replay {
                let cursor = ledger.append(next);
                prop_assert!(reviewing);
                prop_assert_eq!(ledger.len() as isize, target + 2);
                prop_assert_eq!(cursor, ledger.last_index());
                prop_assert!(ledger.is_live());
            } else {
                prop_assert!(!reviewing);
            }
        }

        #[test]
        fn prop_step_back_then_forward_restores_live(n in 1usize..16) {
            let mut ledger = ledger_with(n);
            let live_cursor = ledger.cursor();
            let live_fen = ledger.current_fen().to_string();

            ledger.step_back();
            prop_assert!(ledger.is_reviewing());
            while ledger.is_reviewing() {
                ledger.step_forward();
            }
            prop_assert_eq!(ledger.cursor(), live_cursor);
            prop_assert_eq!(ledger.current_fen(), live_fen.as_str());
        }

        #[test]
        fn prop_cursor_stays_in_range(n in 0usize..10, ops in proptest::collection::vec(0u8..3, 0..30)) {
            let mut ledger = ledger_with(n);
            for op in ops {
                match op {
                    0 => { ledger.step_back(); }
                    1 => { ledger.step_forward(); }
                    _ => { let _ = ledger.jump_to(ledger.last_index() / 2); }
                }
                prop_assert!(ledger.cursor() >= -1 && ledger.cursor() <= ledger.last_index());
                if ledger.is_live() {
                    prop_assert_eq!(ledger.cursor(), ledger.last_index());
                }
            }
        }
    }
}
