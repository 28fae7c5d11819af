use std::sync::Arc;
use std::time::Duration;

use chess::{EngineAnalysis, Game, PlayerColor};
use engine::{
    EngineCommand, EngineEvent, EngineHandle, GoParams, OutputInterpreter, SearchKind, Strength,
    MAX_ANALYSIS_LINES,
};
use explorer::{OpeningDatabase, QueryFilters};

use super::commands::SessionError;
use super::snapshot::{MoveRecord, SessionSnapshot};
use crate::arbiter::MoveSourceArbiter;
use crate::ledger::HistoryLedger;

/// Depth of the background searches that only feed the evaluation display.
const EVALUATION_DEPTH: u8 = 12;
const ANALYSIS_DEPTH: u8 = 16;

/// Internal mutable state, owned entirely by the session actor. No locks.
pub(crate) struct SessionState {
    /// Rules engine, positioned at the ledger cursor.
    pub game: Game,
    pub ledger: HistoryLedger,
    pub arbiter: MoveSourceArbiter,
    pub interpreter: OutputInterpreter,
    pub engine: Option<EngineHandle>,
    pub database: Option<Arc<dyn OpeningDatabase>>,
    pub filters: QueryFilters,
    pub human: PlayerColor,
    pub strength: Strength,
    pub opponent_delay: Duration,
    pub evaluation: Option<f32>,
    pub candidates: Vec<EngineAnalysis>,
    /// An opponent move is scheduled or waiting on the database.
    pub opponent_pending: bool,
    multipv: u8,
}

impl SessionState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        game: Game,
        arbiter: MoveSourceArbiter,
        engine: Option<EngineHandle>,
        database: Option<Arc<dyn OpeningDatabase>>,
        filters: QueryFilters,
        human: PlayerColor,
        strength: Strength,
        opponent_delay: Duration,
    ) -> Self {
        let ledger = HistoryLedger::new(game.to_fen());
        Self {
            game,
            ledger,
            arbiter,
            interpreter: OutputInterpreter::new(),
            engine,
            database,
            filters,
            human,
            strength,
            opponent_delay,
            evaluation: None,
            candidates: Vec::new(),
            opponent_pending: false,
            multipv: 1,
        }
    }

    /// Build a full snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            fen: self.game.to_fen(),
            start_fen: self.ledger.start_fen().to_string(),
            side_to_move: PlayerColor::from(self.game.side_to_move()),
            human: self.human,
            cursor: self.ledger.cursor(),
            reviewing: self.ledger.is_reviewing(),
            history: self.ledger.entries().iter().map(MoveRecord::from).collect(),
            mode: self.arbiter.mode(),
            book_positions: self.arbiter.book().map(|tree| tree.len()),
            book_mark: self.arbiter.book_mark(),
            database_mark: self.arbiter.database_mark(),
            database_enabled: self.arbiter.database_enabled(),
            evaluation: self.evaluation,
            engine_thinking: self.interpreter.is_thinking() || self.opponent_pending,
            elo: self.strength.elo(),
            game_over: self.game.game_over(),
        }
    }

    pub fn is_opponent_turn(&self) -> bool {
        PlayerColor::from(self.game.side_to_move()) != self.human
    }

    /// Live, opponent to move and the game still running.
    pub fn opponent_may_move(&self) -> bool {
        self.ledger.is_live() && self.is_opponent_turn() && self.game.game_over().is_none()
    }

    /// Point the rules engine at the position under the ledger cursor.
    pub fn sync_game(&mut self) -> Result<(), SessionError> {
        self.game
            .load_position(self.ledger.current_fen())
            .map_err(|e| SessionError::Internal(format!("Ledger holds a bad position: {}", e)))
    }

    /// Next engine event, or pending forever when no engine is attached.
    pub async fn next_engine_event(&mut self) -> Option<EngineEvent> {
        match self.engine.as_mut() {
            Some(engine) => match engine.recv().await {
                Some(event) => Some(event),
                None => Some(EngineEvent::Exited),
            },
            None => std::future::pending().await,
        }
    }

    pub async fn send_engine(&self, cmd: EngineCommand) -> Result<(), SessionError> {
        let engine = self.engine.as_ref().ok_or(SessionError::EngineNotConfigured)?;
        engine
            .send(cmd)
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))
    }

    /// Make every outstanding engine search, scheduled opponent move and
    /// database lookup stale, and stop the engine if it is searching.
    pub async fn cancel_searches(&mut self) {
        self.interpreter.invalidate();
        self.opponent_pending = false;
        if self.interpreter.has_outstanding() {
            if let Err(e) = self.send_engine(EngineCommand::Stop).await {
                tracing::warn!("Failed to stop engine: {}", e);
            }
        }
    }

    /// Search the position under the cursor. Any search still running is
    /// stopped and its output discarded.
    pub async fn start_search(&mut self, kind: SearchKind) -> Result<(), SessionError> {
        let Some(engine) = self.engine.as_ref() else {
            return Err(SessionError::EngineNotConfigured);
        };
        let send = |cmd: EngineCommand| async move {
            engine
                .send(cmd)
                .await
                .map_err(|e| SessionError::Internal(e.to_string()))
        };

        if self.interpreter.has_outstanding() {
            self.interpreter.invalidate();
            send(EngineCommand::Stop).await?;
        }

        let (multipv, params) = match kind {
            SearchKind::Play => (1, self.strength.go_params()),
            SearchKind::EvaluationOnly => (1, GoParams::depth(EVALUATION_DEPTH)),
            SearchKind::Analysis { lines } => (
                lines.clamp(1, MAX_ANALYSIS_LINES),
                GoParams::depth(ANALYSIS_DEPTH),
            ),
        };
        if multipv != self.multipv {
            send(EngineCommand::SetOption {
                name: "MultiPV".to_string(),
                value: Some(multipv.to_string()),
            })
            .await?;
            self.multipv = multipv;
        }

        send(EngineCommand::SetPosition {
            fen: self.ledger.start_fen().to_string(),
            moves: self.ledger.moves_to_cursor(),
        })
        .await?;
        let request = self.interpreter.begin(self.game.side_to_move(), kind);
        tracing::debug!(?request, "Starting search");
        send(EngineCommand::Go(params)).await
    }
}
