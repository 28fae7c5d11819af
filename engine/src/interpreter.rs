//! Turns raw engine output into evaluations and moves.
//!
//! Every `go` sent to the engine is registered here as a [`SearchRequest`]
//! tagged with the generation current at issue time. UCI answers each `go`
//! with exactly one `bestmove`, so requests complete in FIFO order; a
//! request whose generation is older than the current one is stale and its
//! output is dropped.

use std::collections::VecDeque;

use chess::{AnalysisScore, EngineAnalysis};
use cozy_chess::{Color, Move};

use crate::uci::{parse_uci_message, EngineInfo, UciMessage};

/// Most ranked lines captured in analysis mode.
pub const MAX_ANALYSIS_LINES: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// The result is played as the opponent's move.
    Play,
    /// Only the evaluation matters; the best move is thrown away.
    EvaluationOnly,
    /// Collect up to `lines` ranked candidates, never play.
    Analysis { lines: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest {
    pub generation: u64,
    /// Side to move in the searched position.
    pub side_to_move: Color,
    pub kind: SearchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Issued before the latest invalidation.
    Stale,
    EvaluationOnly,
    /// The user is looking at an earlier position.
    Reviewing,
    /// `bestmove (none)`
    NoMove,
    /// No search was registered for this output.
    Unsolicited,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Ignored,
    /// Evaluation in pawns from White's point of view.
    Evaluation { pawns: f32, score: AnalysisScore, depth: Option<u8> },
    BestMove { mv: Move, request: SearchRequest },
    AnalysisComplete(Vec<EngineAnalysis>),
    Discarded(DiscardReason),
}

#[derive(Debug, Default)]
pub struct OutputInterpreter {
    generation: u64,
    in_flight: VecDeque<SearchRequest>,
    lines: Vec<EngineAnalysis>,
}

impl OutputInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Register a search about to be sent to the engine.
    pub fn begin(&mut self, side_to_move: Color, kind: SearchKind) -> SearchRequest {
        let request = SearchRequest {
            generation: self.generation,
            side_to_move,
            kind,
        };
        tracing::debug!(?request, "Search registered");
        self.in_flight.push_back(request);
        request
    }

    /// Make every outstanding search stale. Returns the new generation.
    pub fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        self.lines.clear();
        self.generation
    }

    /// Forget all outstanding searches, e.g. after the engine restarted.
    pub fn reset(&mut self) {
        self.invalidate();
        self.in_flight.clear();
    }

    /// True while a search of the current generation is outstanding.
    pub fn is_searching(&self) -> bool {
        self.in_flight.iter().any(|r| r.generation == self.generation)
    }

    /// True while a current-generation search that may play a move is outstanding.
    pub fn is_thinking(&self) -> bool {
        self.in_flight
            .iter()
            .any(|r| r.generation == self.generation && r.kind == SearchKind::Play)
    }

    /// Any search at all, stale or not, that has not answered yet.
    pub fn has_outstanding(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Interpret one line of engine output.
    ///
    /// `reviewing` must be read at call time, not captured when the search
    /// was issued.
    pub fn interpret(&mut self, line: &str, reviewing: bool) -> Interpretation {
        match parse_uci_message(line) {
            Ok(UciMessage::Info(info)) => self.on_info(info),
            Ok(UciMessage::BestMove { mv, .. }) => self.on_bestmove(mv, reviewing),
            Ok(_) => Interpretation::Ignored,
            Err(e) => {
                tracing::trace!("Unparsed engine line: {}", e);
                Interpretation::Ignored
            }
        }
    }

    fn on_info(&mut self, info: EngineInfo) -> Interpretation {
        let Some(request) = self.in_flight.front().copied() else {
            return Interpretation::Ignored;
        };
        if request.generation != self.generation {
            return Interpretation::Ignored;
        }
        let Some(raw) = info.score else {
            return Interpretation::Ignored;
        };
        let score = raw.for_white(request.side_to_move);
        let rank = info.multipv.unwrap_or(1).max(1);

        if let SearchKind::Analysis { lines } = request.kind {
            if rank <= lines.min(MAX_ANALYSIS_LINES) {
                self.record_line(rank, &info, score);
            }
        }

        if rank == 1 {
            Interpretation::Evaluation {
                pawns: score.pawns(),
                score,
                depth: info.depth,
            }
        } else {
            Interpretation::Ignored
        }
    }

    fn record_line(&mut self, rank: u8, info: &EngineInfo, score: AnalysisScore) {
        let line = EngineAnalysis {
            multipv: rank,
            depth: info.depth.map(u32::from),
            score: Some(score),
            pv: info.pv.iter().map(|mv| chess::format_uci_move(*mv)).collect(),
        };
        match self.lines.iter_mut().find(|l| l.multipv == rank) {
            Some(existing) => *existing = line,
            None => {
                self.lines.push(line);
                self.lines.sort_by_key(|l| l.multipv);
            }
        }
    }

    fn on_bestmove(&mut self, mv: Option<Move>, reviewing: bool) -> Interpretation {
        let Some(request) = self.in_flight.pop_front() else {
            tracing::debug!("bestmove with no registered search");
            return Interpretation::Discarded(DiscardReason::Unsolicited);
        };

        if request.generation != self.generation {
            tracing::debug!(?request, "Discarding stale bestmove");
            return Interpretation::Discarded(DiscardReason::Stale);
        }

        match request.kind {
            SearchKind::EvaluationOnly => Interpretation::Discarded(DiscardReason::EvaluationOnly),
            SearchKind::Analysis { .. } => {
                Interpretation::AnalysisComplete(std::mem::take(&mut self.lines))
            }
            SearchKind::Play if reviewing => {
                tracing::debug!("Discarding bestmove while reviewing");
                Interpretation::Discarded(DiscardReason::Reviewing)
            }
            SearchKind::Play => match mv {
                Some(mv) => Interpretation::BestMove { mv, request },
                None => Interpretation::Discarded(DiscardReason::NoMove),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::MATE_EVALUATION;

    #[test]
    fn test_black_perspective_is_negated() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::Black, SearchKind::Play);
        match interp.interpret("info depth 10 score cp 35 pv e7e5", false) {
            Interpretation::Evaluation { pawns, .. } => assert_eq!(pawns, -0.35),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mate_is_saturated() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::White, SearchKind::EvaluationOnly);
        match interp.interpret("info depth 10 score mate -3", false) {
            Interpretation::Evaluation { pawns, .. } => assert_eq!(pawns, -MATE_EVALUATION),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_play_request_yields_move() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::White, SearchKind::Play);
        assert!(interp.is_thinking());
        match interp.interpret("bestmove e2e4 ponder e7e5", false) {
            Interpretation::BestMove { mv, .. } => assert_eq!(chess::format_uci_move(mv), "e2e4"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!interp.has_outstanding());
    }

    #[test]
    fn test_evaluation_only_discards_move() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::White, SearchKind::EvaluationOnly);
        assert_eq!(
            interp.interpret("bestmove e2e4", false),
            Interpretation::Discarded(DiscardReason::EvaluationOnly)
        );
        assert!(!interp.is_searching());
    }

    #[test]
    fn test_reviewing_discards_move() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::White, SearchKind::Play);
        assert_eq!(
            interp.interpret("bestmove e2e4", true),
            Interpretation::Discarded(DiscardReason::Reviewing)
        );
    }

    #[test]
    fn test_stale_search_output_is_dropped_in_order() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::White, SearchKind::Play);
        interp.invalidate();
        interp.begin(Color::Black, SearchKind::EvaluationOnly);

        // Leftovers of the first search arrive before the new one answers.
        assert_eq!(interp.interpret("info depth 5 score cp 80", false), Interpretation::Ignored);
        assert_eq!(
            interp.interpret("bestmove e2e4", false),
            Interpretation::Discarded(DiscardReason::Stale)
        );
        // Now the evaluation-only search is at the front.
        assert!(matches!(
            interp.interpret("info depth 5 score cp 80", false),
            Interpretation::Evaluation { pawns, .. } if pawns == -0.8
        ));
        assert_eq!(
            interp.interpret("bestmove d7d5", false),
            Interpretation::Discarded(DiscardReason::EvaluationOnly)
        );
    }

    #[test]
    fn test_analysis_collects_ranked_lines() {
        let mut interp = OutputInterpreter::new();
        interp.begin(Color::White, SearchKind::Analysis { lines: 3 });
        interp.interpret("info depth 12 multipv 2 score cp 20 pv d2d4 d7d5", false);
        interp.interpret("info depth 12 multipv 1 score cp 30 pv e2e4 e7e5", false);
        interp.interpret("info depth 12 multipv 4 score cp 5 pv a2a3", false);
        interp.interpret("info depth 13 multipv 1 score cp 31 pv e2e4 c7c5", false);

        match interp.interpret("bestmove e2e4", false) {
            Interpretation::AnalysisComplete(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].multipv, 1);
                assert_eq!(lines[0].depth, Some(13));
                assert_eq!(lines[0].pv, vec!["e2e4", "c7c5"]);
                assert_eq!(lines[1].score, Some(AnalysisScore::Centipawns(20)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsolicited_and_none() {
        let mut interp = OutputInterpreter::new();
        assert_eq!(
            interp.interpret("bestmove e2e4", false),
            Interpretation::Discarded(DiscardReason::Unsolicited)
        );
        interp.begin(Color::White, SearchKind::Play);
        assert_eq!(
            interp.interpret("bestmove (none)", false),
            Interpretation::Discarded(DiscardReason::NoMove)
        );
        assert_eq!(interp.interpret("readyok", false), Interpretation::Ignored);
    }
}
