pub mod actor;
pub mod commands;
pub mod events;
pub mod handle;
pub mod snapshot;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use chess::{Game, OpeningTree, PlayerColor, StartPosition};
use engine::{EngineHandle, Strength};
use explorer::{OpeningDatabase, QueryFilters};
use tokio::sync::{broadcast, mpsc};

use crate::arbiter::MoveSourceArbiter;
use actor::run_session_actor;
pub use commands::SessionError;
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use snapshot::{MoveRecord, SessionSnapshot};
use state::SessionState;

/// Settings fixed at session start. Most can be changed later through the
/// [`SessionHandle`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub start: StartPosition,
    pub human: PlayerColor,
    pub strength: Strength,
    pub filters: QueryFilters,
    pub database_enabled: bool,
    /// Pause before the opponent answers.
    pub opponent_delay: Duration,
    /// Seed for choosing among book and database candidates; fresh entropy
    /// when `None`.
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start: StartPosition::Standard,
            human: PlayerColor::White,
            strength: Strength::default(),
            filters: QueryFilters::default(),
            database_enabled: true,
            opponent_delay: Duration::from_millis(300),
            seed: None,
        }
    }
}

/// Spawn a session actor and return its handle.
///
/// `engine` and `database` are optional collaborators: without an engine
/// there are no evaluations and the opponent cannot leave book, without a
/// database the Database source is skipped.
pub fn spawn_session(
    options: SessionOptions,
    engine: Option<EngineHandle>,
    database: Option<Arc<dyn OpeningDatabase>>,
    book: Option<OpeningTree>,
) -> Result<SessionHandle, SessionError> {
    let board = options
        .start
        .board()
        .map_err(|e| SessionError::InvalidFen(e.to_string()))?;
    let game = Game::from_board(board);

    let database_enabled = options.database_enabled && database.is_some();
    let mut arbiter = match options.seed {
        Some(seed) => MoveSourceArbiter::seeded(database_enabled, seed),
        None => MoveSourceArbiter::from_entropy(database_enabled),
    };
    if let Some(tree) = book {
        arbiter.load_book(tree, -1);
    }

    let state = SessionState::new(
        game,
        arbiter,
        engine,
        database,
        options.filters,
        options.human,
        options.strength,
        options.opponent_delay,
    );

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(100);
    tokio::spawn(run_session_actor(state, cmd_rx, event_tx));

    Ok(SessionHandle::new(cmd_tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::MoveSource;
    use crate::ledger::MoveOrigin;
    use cozy_chess::{File, Move, Rank, Square};

    fn mv(from: (File, Rank), to: (File, Rank)) -> Move {
        Move {
            from: Square::new(from.0, from.1),
            to: Square::new(to.0, to.1),
            promotion: None,
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            opponent_delay: Duration::from_millis(5),
            seed: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_subscribe_gets_initial_snapshot() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        let (snapshot, _rx) = handle.subscribe().await.unwrap();
        assert_eq!(snapshot.cursor, -1);
        assert_eq!(snapshot.move_count(), 0);
        assert_eq!(snapshot.side_to_move, PlayerColor::White);
        assert_eq!(snapshot.mode, MoveSource::Engine);
        assert!(!snapshot.database_enabled);
        assert!(!snapshot.engine_thinking);
    }

    #[tokio::test]
    async fn test_not_your_turn_and_illegal() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        let e2e5 = mv((File::E, Rank::Second), (File::E, Rank::Fifth));
        assert!(matches!(
            handle.make_move(e2e5).await,
            Err(SessionError::IllegalMove(_))
        ));

        let e2e4 = mv((File::E, Rank::Second), (File::E, Rank::Fourth));
        let snap = handle.make_move(e2e4).await.unwrap();
        assert_eq!(snap.cursor, 0);
        assert_eq!(snap.history[0].origin, MoveOrigin::Human);

        // No engine and no book: the opponent cannot answer
        let e7e5 = mv((File::E, Rank::Seventh), (File::E, Rank::Fifth));
        assert!(matches!(
            handle.make_move(e7e5).await,
            Err(SessionError::NotYourTurn)
        ));
    }

    #[tokio::test]
    async fn test_book_reply_and_invalid_book_keeps_previous() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();
        handle.load_book("1. e4 c5 *").await.unwrap();
        assert!(matches!(
            handle.load_book("this is not pgn").await,
            Err(SessionError::InvalidBook(_))
        ));

        handle
            .make_move(mv((File::E, Rank::Second), (File::E, Rank::Fourth)))
            .await
            .unwrap();
        loop {
            if let SessionEvent::OpponentMoved(record) = events.recv().await.unwrap() {
                assert_eq!(record.san, "c5");
                assert_eq!(record.origin, MoveOrigin::Book);
                break;
            }
        }
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.cursor, 1);
        assert_eq!(snap.mode, MoveSource::Book);
    }

    #[tokio::test]
    async fn test_book_follows_custom_start() {
        let opts = SessionOptions {
            start: StartPosition::Fen("4k3/4p3/8/8/8/8/4P3/4K3 w - - 0 1".to_string()),
            human: PlayerColor::Black,
            ..options()
        };
        let handle = spawn_session(opts, None, None, None).unwrap();
        let (_, mut events) = handle.subscribe().await.unwrap();

        // No FEN tag: the moves are replayed from the session's start
        let snap = handle.load_book("1. Kd2 Kd7 *").await.unwrap();
        assert_eq!(snap.book_positions, Some(2));
        assert_eq!(snap.mode, MoveSource::Book);
        loop {
            if let SessionEvent::OpponentMoved(record) = events.recv().await.unwrap() {
                assert_eq!(record.san, "Kd2");
                assert_eq!(record.origin, MoveOrigin::Book);
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_navigation_and_jump_errors() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        assert_eq!(handle.step_back().await.unwrap().cursor, -1);
        assert!(matches!(
            handle.jump_to(3).await,
            Err(SessionError::Ledger(_))
        ));

        handle
            .make_move(mv((File::G, Rank::First), (File::F, Rank::Third)))
            .await
            .unwrap();
        let snap = handle.step_back().await.unwrap();
        assert_eq!(snap.cursor, -1);
        assert!(snap.reviewing);
        assert_eq!(snap.fen, snap.start_fen);

        let snap = handle.step_forward().await.unwrap();
        assert_eq!(snap.cursor, 0);
        assert!(!snap.reviewing);
    }

    #[tokio::test]
    async fn test_load_position_and_reset() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        let fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1";
        let snap = handle.load_position(fen).await.unwrap();
        assert_eq!(snap.start_fen, fen);
        assert!(handle.load_position("garbage").await.is_err());

        handle
            .make_move(mv((File::E, Rank::Second), (File::E, Rank::Fourth)))
            .await
            .unwrap();
        let snap = handle.reset().await.unwrap();
        assert_eq!(snap.fen, fen);
        assert_eq!(snap.move_count(), 0);
    }

    #[tokio::test]
    async fn test_candidates_need_engine() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        assert!(matches!(
            handle.show_candidates(3).await,
            Err(SessionError::EngineNotConfigured)
        ));
        assert_eq!(handle.set_strength(9000).await.unwrap(), Strength::MAX_ELO);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let handle = spawn_session(options(), None, None, None).unwrap();
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.get_snapshot().await.is_err());
    }
}
