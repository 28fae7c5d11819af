pub mod interpreter;
pub mod stockfish;
pub mod strength;
pub mod uci;

pub use interpreter::{
    DiscardReason, Interpretation, OutputInterpreter, SearchKind, SearchRequest,
    MAX_ANALYSIS_LINES,
};
pub use stockfish::{spawn_stockfish, EngineConfig};
pub use strength::Strength;
pub use uci::{UciError, UciMessage};

use tokio::sync::mpsc;

/// Handle for communicating with a chess engine.
///
/// Whatever sits on the other end (a Stockfish process, a test script)
/// receives [`EngineCommand`]s and answers with [`EngineEvent`]s.
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    rx: mpsc::Receiver<EngineEvent>,
}

/// The engine side of an [`EngineHandle`].
pub struct EngineEndpoint {
    pub commands: mpsc::Receiver<EngineCommand>,
    pub events: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Create a connected handle/endpoint pair.
    pub fn channel(buffer: usize) -> (EngineHandle, EngineEndpoint) {
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let (event_tx, event_rx) = mpsc::channel(buffer);
        (
            EngineHandle {
                tx: command_tx,
                rx: event_rx,
            },
            EngineEndpoint {
                commands: command_rx,
                events: event_tx,
            },
        )
    }

    /// Send a command to the engine
    pub async fn send(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        tracing::debug!("Queueing command: {:?}", cmd);
        self.tx.send(cmd).await.map_err(|_| EngineError::Closed)
    }

    /// Receive the next engine event. `None` once the engine is gone.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Ask the engine to quit. The process side reaps the child.
    pub async fn shutdown(self) {
        let _ = self.tx.send(EngineCommand::Quit).await;
    }
}

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    SetOption { name: String, value: Option<String> },
    NewGame,
    SetPosition { fen: String, moves: Vec<cozy_chess::Move> },
    StartPosition { moves: Vec<cozy_chess::Move> },
    Go(GoParams),
    Stop,
    IsReady,
    Quit,
}

impl EngineCommand {
    /// Render the command as a UCI line (with trailing newline).
    pub fn to_uci(&self) -> String {
        let mut line = match self {
            Self::SetOption { name, value } => match value {
                Some(val) => format!("setoption name {} value {}", name, val),
                None => format!("setoption name {}", name),
            },
            Self::NewGame => "ucinewgame".to_string(),
            Self::SetPosition { fen, moves } => with_moves(format!("position fen {}", fen), moves),
            Self::StartPosition { moves } => with_moves("position startpos".to_string(), moves),
            Self::Go(params) => params.to_uci(),
            Self::Stop => "stop".to_string(),
            Self::IsReady => "isready".to_string(),
            Self::Quit => "quit".to_string(),
        };
        line.push('\n');
        line
    }
}

fn with_moves(mut cmd: String, moves: &[cozy_chess::Move]) -> String {
    if !moves.is_empty() {
        cmd.push_str(" moves");
        for mv in moves {
            cmd.push(' ');
            cmd.push_str(&chess_common::format_uci_move(*mv));
        }
    }
    cmd
}

/// Parameters for the "go" command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub movetime: Option<u64>, // Move time in milliseconds
    pub depth: Option<u8>,     // Search depth
    pub infinite: bool,        // Search until "stop"
}

impl GoParams {
    pub fn depth(depth: u8) -> Self {
        Self {
            depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn movetime(ms: u64) -> Self {
        Self {
            movetime: Some(ms),
            ..Default::default()
        }
    }

    fn to_uci(&self) -> String {
        if let Some(movetime) = self.movetime {
            format!("go movetime {}", movetime)
        } else if let Some(depth) = self.depth {
            format!("go depth {}", depth)
        } else if self.infinite {
            "go infinite".to_string()
        } else {
            "go movetime 1000".to_string()
        }
    }
}

/// Events received from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One line of engine stdout, trimmed
    Output(String),
    Error(String),
    /// The engine process is gone
    Exited,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Stockfish not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Engine has no {0}")]
    MissingPipe(&'static str),
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Timeout waiting for engine to respond")]
    Timeout,
    #[error("Engine closed before finishing the handshake")]
    Handshake,
    #[error("Engine channel closed")]
    Closed,
}
