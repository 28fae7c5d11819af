use chess::EngineAnalysis;
use cozy_chess::Move;
use explorer::QueryFilters;
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Invalid opening book: {0}")]
    InvalidBook(String),
    #[error("It is not your turn")]
    NotYourTurn,
    #[error("Game is not ongoing")]
    GameNotOngoing,
    #[error("Engine not configured")]
    EngineNotConfigured,
    #[error("Engine is busy choosing a move")]
    EngineBusy,
    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
/// Note: there is no "opponent, move now" command; the actor decides.
pub enum SessionCommand {
    MakeMove {
        mv: Move,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    StepBack {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    StepForward {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    JumpTo {
        index: isize,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    LoadBook {
        pgn: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    ClearBook {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    LoadPosition {
        fen: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Reset {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    SetStrength {
        elo: u16,
        reply: oneshot::Sender<Result<u16, SessionError>>,
    },
    SetFilters {
        filters: QueryFilters,
        reply: oneshot::Sender<()>,
    },
    SetDatabaseEnabled {
        enabled: bool,
        reply: oneshot::Sender<SessionSnapshot>,
    },
    ShowCandidates {
        lines: u8,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    GetCandidates {
        reply: oneshot::Sender<Vec<EngineAnalysis>>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
