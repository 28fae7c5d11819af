use chess::{EngineAnalysis, GameOverReason};

use super::snapshot::{MoveRecord, SessionSnapshot};

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SessionEvent {
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    /// Evaluation in pawns from White's point of view.
    Evaluation(f32),
    /// Ranked lines requested with `show_candidates`.
    Candidates(Vec<EngineAnalysis>),
    OpponentMoved(MoveRecord),
    GameOver(GameOverReason),
    /// Transient, user-facing notice (e.g. a source fell back to the engine).
    Notice(String),
    /// Error notification.
    Error(String),
}
