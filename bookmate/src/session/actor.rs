use chess::{
    convert_uci_castling_to_cozy, format_uci_move, BookError, CompileOptions, Game, OpeningTree,
    StartPosition,
};
use cozy_chess::Move;
use engine::{EngineCommand, EngineEvent, Interpretation, SearchKind, Strength};
use explorer::{to_candidates, DatabaseMove, ExplorerResult};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::Instrument;

use super::commands::*;
use super::events::SessionEvent;
use super::snapshot::{MoveRecord, SessionSnapshot};
use super::state::SessionState;
use crate::arbiter::MoveSource;
use crate::ledger::{LedgerEntry, LedgerError, MoveOrigin};

/// Messages the actor sends to itself from spawned tasks. Each carries the
/// interpreter generation current when it was issued.
pub(crate) enum Internal {
    OpponentTurn {
        generation: u64,
    },
    DatabaseAnswer {
        generation: u64,
        index: isize,
        result: ExplorerResult<Vec<DatabaseMove>>,
    },
}

struct Outbox {
    events: broadcast::Sender<SessionEvent>,
    internal: mpsc::UnboundedSender<Internal>,
}

impl Outbox {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn state_changed(&self, state: &SessionState) -> SessionSnapshot {
        let snapshot = state.snapshot();
        self.emit(SessionEvent::StateChanged(snapshot.clone()));
        snapshot
    }
}

enum Step {
    Back,
    Forward,
    Jump(isize),
}

/// The main session actor loop.
/// Owns all mutable state. Processes commands, engine output and its own
/// timers sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    run_session_actor_inner(state, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session"))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel();
    let outbox = Outbox {
        events: event_tx,
        internal: internal_tx,
    };

    if state.engine.is_some() {
        if let Err(e) = state.send_engine(EngineCommand::NewGame).await {
            tracing::warn!("Failed to reset engine: {}", e);
        }
    }
    // The opponent may have the first move
    after_position_change(&mut state, &outbox).await;

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        if let Some(engine) = state.engine.take() {
                            engine.shutdown().await;
                        }
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &outbox).await,
                }
            }

            Some(internal) = internal_rx.recv() => {
                handle_internal(&mut state, internal, &outbox).await;
            }

            Some(engine_event) = state.next_engine_event() => {
                handle_engine_event(&mut state, engine_event, &outbox).await;
            }
        }
    }

    tracing::info!("Session actor exited");
}

async fn handle_command(state: &mut SessionState, cmd: SessionCommand, outbox: &Outbox) {
    match cmd {
        SessionCommand::MakeMove { mv, reply } => {
            let result = human_move(state, mv, outbox).await;
            let played = result.is_ok();
            let _ = reply.send(result);
            if played {
                after_position_change(state, outbox).await;
            }
        }
        SessionCommand::StepBack { reply } => {
            navigate_and_reply(state, Step::Back, reply, outbox).await;
        }
        SessionCommand::StepForward { reply } => {
            navigate_and_reply(state, Step::Forward, reply, outbox).await;
        }
        SessionCommand::JumpTo { index, reply } => {
            navigate_and_reply(state, Step::Jump(index), reply, outbox).await;
        }
        SessionCommand::LoadBook { pgn, reply } => match compile_book(state, &pgn) {
            Ok(tree) => {
                let positions = tree.len();
                state.cancel_searches().await;
                state.arbiter.load_book(tree, state.ledger.cursor());
                outbox.emit(SessionEvent::Notice(format!(
                    "Opening book loaded ({} positions)",
                    positions
                )));
                let _ = reply.send(Ok(outbox.state_changed(state)));
                after_position_change(state, outbox).await;
            }
            Err(e) => {
                tracing::warn!("Rejected opening book: {}", e);
                let _ = reply.send(Err(SessionError::InvalidBook(e.to_string())));
            }
        },
        SessionCommand::ClearBook { reply } => {
            state.cancel_searches().await;
            state.arbiter.clear_book(state.ledger.cursor());
            let _ = reply.send(outbox.state_changed(state));
            after_position_change(state, outbox).await;
        }
        SessionCommand::LoadPosition { fen, reply } => match Game::from_fen(&fen) {
            Ok(game) => {
                restart(state, game, outbox).await;
                let _ = reply.send(Ok(outbox.state_changed(state)));
                after_position_change(state, outbox).await;
            }
            Err(e) => {
                let _ = reply.send(Err(SessionError::InvalidFen(e.to_string())));
            }
        },
        SessionCommand::Reset { reply } => {
            match Game::from_fen(state.ledger.start_fen()) {
                Ok(game) => restart(state, game, outbox).await,
                Err(e) => tracing::error!("Recorded start position is invalid: {}", e),
            }
            let _ = reply.send(outbox.state_changed(state));
            after_position_change(state, outbox).await;
        }
        SessionCommand::SetStrength { elo, reply } => {
            let result = set_strength(state, elo).await;
            let _ = reply.send(result);
            outbox.state_changed(state);
            if state.engine.is_some() {
                after_position_change(state, outbox).await;
            }
        }
        SessionCommand::SetFilters { filters, reply } => {
            tracing::debug!(?filters, "Database filters updated");
            state.filters = filters;
            let _ = reply.send(());
        }
        SessionCommand::SetDatabaseEnabled { enabled, reply } => {
            state
                .arbiter
                .set_database_enabled(enabled && state.database.is_some(), state.ledger.cursor());
            let _ = reply.send(outbox.state_changed(state));
        }
        SessionCommand::ShowCandidates { lines, reply } => {
            let result = if state.engine.is_none() {
                Err(SessionError::EngineNotConfigured)
            } else if state.interpreter.is_thinking() || state.opponent_pending {
                Err(SessionError::EngineBusy)
            } else {
                state.candidates.clear();
                state.start_search(SearchKind::Analysis { lines }).await
            };
            let _ = reply.send(result);
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SessionCommand::GetCandidates { reply } => {
            let _ = reply.send(state.candidates.clone());
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = outbox.events.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

async fn human_move(
    state: &mut SessionState,
    mv: Move,
    outbox: &Outbox,
) -> Result<SessionSnapshot, SessionError> {
    if state.game.game_over().is_some() {
        return Err(SessionError::GameNotOngoing);
    }
    if state.is_opponent_turn() {
        return Err(SessionError::NotYourTurn);
    }
    let legal = state.game.legal_moves();
    let mv = convert_uci_castling_to_cozy(mv, &legal);
    if !legal.contains(&mv) {
        return Err(SessionError::IllegalMove(format_uci_move(mv)));
    }

    state.cancel_searches().await;
    let applied = state
        .game
        .apply_move(mv)
        .map_err(|e| SessionError::IllegalMove(e.to_string()))?;
    tracing::info!(san = %applied.san, "Human move");
    let cursor = state.ledger.append(LedgerEntry {
        mv: applied.mv,
        san: applied.san,
        fen: applied.fen,
        origin: MoveOrigin::Human,
    });
    state.arbiter.recompute(cursor);
    state.candidates.clear();
    Ok(outbox.state_changed(state))
}

async fn navigate_and_reply(
    state: &mut SessionState,
    step: Step,
    reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    outbox: &Outbox,
) {
    match navigate(state, step, outbox).await {
        Ok((snapshot, moved)) => {
            let _ = reply.send(Ok(snapshot));
            if moved {
                after_position_change(state, outbox).await;
            }
        }
        Err(e) => {
            let _ = reply.send(Err(e));
        }
    }
}

/// Review navigation. Order matters: the ledger is flagged as reviewing
/// before outstanding searches are cancelled, and only then is the cursor
/// moved. Returns the snapshot and whether the cursor moved.
async fn navigate(
    state: &mut SessionState,
    step: Step,
    outbox: &Outbox,
) -> Result<(SessionSnapshot, bool), SessionError> {
    let ledger = &state.ledger;
    let noop = match step {
        Step::Back => ledger.cursor() == -1,
        Step::Forward => ledger.is_live(),
        Step::Jump(index) => {
            if index < -1 || index > ledger.last_index() {
                return Err(LedgerError::IndexOutOfRange {
                    index,
                    len: ledger.len(),
                }
                .into());
            }
            index == ledger.cursor() && ledger.is_live()
        }
    };
    if noop {
        return Ok((state.snapshot(), false));
    }

    state.ledger.mark_reviewing();
    state.cancel_searches().await;
    let nav = match step {
        Step::Back => state.ledger.step_back(),
        Step::Forward => state.ledger.step_forward(),
        Step::Jump(index) => state.ledger.jump_to(index)?,
    };
    state.sync_game()?;
    let mode = state.arbiter.recompute(nav.cursor);
    state.candidates.clear();
    tracing::debug!(cursor = nav.cursor, reviewing = nav.reviewing, %mode, "Navigated");
    Ok((outbox.state_changed(state), true))
}

/// Games without a `FEN` tag are replayed from the session's start position.
fn compile_book(state: &SessionState, pgn: &str) -> Result<OpeningTree, BookError> {
    let options = CompileOptions {
        baseline: StartPosition::Fen(state.ledger.start_fen().to_string()),
    };
    chess::compile_with(pgn, &options)
}

/// Start over from `game`'s position with an empty ledger.
async fn restart(state: &mut SessionState, game: Game, outbox: &Outbox) {
    state.cancel_searches().await;
    state.ledger.reset(game.to_fen());
    state.game = game;
    state.arbiter.clear_marks();
    state.arbiter.recompute(-1);
    state.evaluation = None;
    state.candidates.clear();
    if state.engine.is_some() {
        if let Err(e) = state.send_engine(EngineCommand::NewGame).await {
            tracing::warn!("Failed to reset engine: {}", e);
        }
    }
    outbox.emit(SessionEvent::Notice("New game".to_string()));
}

async fn set_strength(state: &mut SessionState, elo: u16) -> Result<u16, SessionError> {
    state.strength = Strength::from_elo(elo);
    tracing::info!(elo = state.strength.elo(), "Opponent strength set");
    if state.engine.is_some() {
        // Options only change between searches
        state.cancel_searches().await;
        for cmd in state.strength.options() {
            state.send_engine(cmd).await?;
        }
    }
    Ok(state.strength.elo())
}

/// Decide what happens next at the position under the cursor: report a
/// finished game, schedule the opponent, or refresh the evaluation.
async fn after_position_change(state: &mut SessionState, outbox: &Outbox) {
    if let Some(reason) = state.game.game_over() {
        if state.ledger.is_live() {
            tracing::info!("Game over: {}", reason);
            outbox.emit(SessionEvent::GameOver(reason));
        }
        return;
    }

    if state.opponent_may_move() {
        schedule_opponent(state, outbox);
    } else if state.engine.is_some() {
        if let Err(e) = state.start_search(SearchKind::EvaluationOnly).await {
            tracing::warn!("Evaluation request failed: {}", e);
        }
    }
}

/// Ask for the opponent's move after the configured delay.
fn schedule_opponent(state: &mut SessionState, outbox: &Outbox) {
    if state.opponent_pending {
        return;
    }
    state.opponent_pending = true;
    let generation = state.interpreter.generation();
    let delay = state.opponent_delay;
    let tx = outbox.internal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(Internal::OpponentTurn { generation });
    });
}

async fn handle_internal(state: &mut SessionState, msg: Internal, outbox: &Outbox) {
    match msg {
        Internal::OpponentTurn { generation } => {
            if generation != state.interpreter.generation() {
                tracing::debug!(generation, "Dropping stale opponent turn");
                return;
            }
            state.opponent_pending = false;
            request_opponent_move(state, outbox).await;
        }
        Internal::DatabaseAnswer {
            generation,
            index,
            result,
        } => {
            if generation != state.interpreter.generation() {
                tracing::debug!(generation, "Dropping stale database answer");
                return;
            }
            state.opponent_pending = false;
            if !state.opponent_may_move() || state.ledger.cursor() != index {
                return;
            }
            on_database_answer(state, index, result, outbox).await;
        }
    }
}

async fn request_opponent_move(state: &mut SessionState, outbox: &Outbox) {
    if !state.opponent_may_move() {
        return;
    }
    let index = state.ledger.cursor();

    match state.arbiter.mode() {
        MoveSource::Book => {
            match state.arbiter.book_move(state.game.position(), index) {
                Some(candidate) => {
                    play_opponent_move(state, candidate.mv, MoveOrigin::Book, outbox).await;
                }
                None => {
                    outbox.emit(SessionEvent::Notice("Out of book".to_string()));
                    engine_move(state, outbox).await;
                }
            }
        }
        MoveSource::Database => query_database(state, index, outbox).await,
        MoveSource::Engine => engine_move(state, outbox).await,
    }
}

async fn query_database(state: &mut SessionState, index: isize, outbox: &Outbox) {
    let Some(database) = state.database.clone() else {
        state.arbiter.database_exhausted(index);
        engine_move(state, outbox).await;
        return;
    };

    state.opponent_pending = true;
    let generation = state.interpreter.generation();
    let fen = state.game.to_fen();
    let filters = state.filters.clone();
    let tx = outbox.internal.clone();
    tokio::spawn(
        async move {
            let result = database.query(&fen, &filters).await;
            let _ = tx.send(Internal::DatabaseAnswer {
                generation,
                index,
                result,
            });
        }
        .in_current_span(),
    );
}

async fn on_database_answer(
    state: &mut SessionState,
    index: isize,
    result: ExplorerResult<Vec<DatabaseMove>>,
    outbox: &Outbox,
) {
    match result {
        Ok(moves) => {
            let candidates = to_candidates(state.game.position(), &moves);
            match state.arbiter.database_move(&candidates, index) {
                Some(candidate) => {
                    play_opponent_move(state, candidate.mv, MoveOrigin::Database, outbox).await;
                }
                None => {
                    outbox.emit(SessionEvent::Notice(
                        "No database moves here, using engine".to_string(),
                    ));
                    engine_move(state, outbox).await;
                }
            }
        }
        Err(e) => {
            tracing::warn!("Database lookup failed: {}", e);
            state.arbiter.database_exhausted(index);
            let notice = if e.is_rate_limited() {
                "Opening database rate-limited, using engine".to_string()
            } else {
                format!("Opening database unavailable ({}), using engine", e)
            };
            outbox.emit(SessionEvent::Notice(notice));
            engine_move(state, outbox).await;
        }
    }
}

async fn engine_move(state: &mut SessionState, outbox: &Outbox) {
    if state.engine.is_none() {
        tracing::error!("No engine to choose a move");
        outbox.emit(SessionEvent::Error(
            "No engine available to choose a move".to_string(),
        ));
        return;
    }
    match state.start_search(SearchKind::Play).await {
        Ok(()) => {
            outbox.state_changed(state);
        }
        Err(e) => {
            tracing::error!("Failed to start engine search: {}", e);
            outbox.emit(SessionEvent::Error(format!("Engine search failed: {}", e)));
        }
    }
}

async fn play_opponent_move(
    state: &mut SessionState,
    mv: Move,
    origin: MoveOrigin,
    outbox: &Outbox,
) {
    match state.game.apply_move(mv) {
        Ok(applied) => {
            tracing::info!(san = %applied.san, ?origin, "Opponent move");
            let entry = LedgerEntry {
                mv: applied.mv,
                san: applied.san,
                fen: applied.fen,
                origin,
            };
            let record = MoveRecord::from(&entry);
            let cursor = state.ledger.append(entry);
            state.arbiter.recompute(cursor);
            outbox.emit(SessionEvent::OpponentMoved(record));
            outbox.state_changed(state);
            after_position_change(state, outbox).await;
        }
        Err(e) => {
            tracing::warn!(?origin, "Rules engine rejected {}: {}", format_uci_move(mv), e);
            state.arbiter.force_engine();
            if origin == MoveOrigin::Engine {
                outbox.emit(SessionEvent::Error(format!(
                    "Engine suggested illegal move: {}",
                    format_uci_move(mv)
                )));
            } else {
                engine_move(state, outbox).await;
            }
        }
    }
}

async fn handle_engine_event(state: &mut SessionState, event: EngineEvent, outbox: &Outbox) {
    match event {
        EngineEvent::Output(line) => {
            let reviewing = state.ledger.is_reviewing();
            match state.interpreter.interpret(&line, reviewing) {
                Interpretation::Evaluation { pawns, .. } => {
                    state.evaluation = Some(pawns);
                    outbox.emit(SessionEvent::Evaluation(pawns));
                }
                Interpretation::BestMove { mv, .. } => {
                    if !state.opponent_may_move() {
                        tracing::debug!("Ignoring bestmove, opponent may not move");
                        return;
                    }
                    let legal = state.game.legal_moves();
                    let mv = convert_uci_castling_to_cozy(mv, &legal);
                    play_opponent_move(state, mv, MoveOrigin::Engine, outbox).await;
                }
                Interpretation::AnalysisComplete(lines) => {
                    state.candidates = lines.clone();
                    outbox.emit(SessionEvent::Candidates(lines));
                }
                Interpretation::Discarded(reason) => {
                    tracing::debug!(?reason, "Engine result discarded");
                }
                Interpretation::Ignored => {}
            }
        }
        EngineEvent::Error(err) => {
            tracing::error!("Engine error: {}", err);
            outbox.emit(SessionEvent::Error(format!("Engine error: {}", err)));
        }
        EngineEvent::Exited => {
            tracing::error!("Engine exited");
            state.engine = None;
            state.interpreter.reset();
            state.opponent_pending = false;
            outbox.emit(SessionEvent::Error("Engine exited".to_string()));
            outbox.state_changed(state);
        }
    }
}
