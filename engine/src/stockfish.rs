use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::uci::{parse_uci_message, UciMessage};
use crate::{EngineCommand, EngineEndpoint, EngineError, EngineEvent, EngineHandle, Strength};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Configuration for engine performance tuning.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Explicit binary path; common install locations are searched otherwise.
    pub path: Option<PathBuf>,
    pub strength: Strength,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

/// Spawn a Stockfish process, complete the UCI handshake and apply `config`.
#[tracing::instrument(level = "info")]
pub async fn spawn_stockfish(config: &EngineConfig) -> Result<EngineHandle, EngineError> {
    let path = match &config.path {
        Some(path) => path.clone(),
        None => find_stockfish_path().ok_or(EngineError::NotFound)?,
    };
    tracing::info!("Found Stockfish at: {:?}", path);

    let mut process = tokio::process::Command::new(&path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            tracing::error!("Failed to spawn Stockfish: {}", e);
            EngineError::Spawn(e)
        })?;

    let mut stdin = process.stdin.take().ok_or(EngineError::MissingPipe("stdin"))?;
    let stdout = process.stdout.take().ok_or(EngineError::MissingPipe("stdout"))?;
    let mut lines = BufReader::new(stdout).lines();

    write_line(&mut stdin, "uci\n").await?;
    tokio::time::timeout(HANDSHAKE_TIMEOUT, wait_for_uciok(&mut lines))
        .await
        .map_err(|_| {
            tracing::error!("Timeout waiting for uciok");
            EngineError::Timeout
        })??;

    let mut setup = config.strength.options();
    if let Some(threads) = config.threads {
        setup.push(EngineCommand::SetOption {
            name: "Threads".to_string(),
            value: Some(threads.clamp(1, 16).to_string()),
        });
    }
    if let Some(hash_mb) = config.hash_mb {
        setup.push(EngineCommand::SetOption {
            name: "Hash".to_string(),
            value: Some(hash_mb.clamp(1, 2048).to_string()),
        });
    }
    setup.push(EngineCommand::IsReady);
    for cmd in &setup {
        write_line(&mut stdin, &cmd.to_uci()).await?;
    }
    tracing::info!(elo = config.strength.elo(), "Engine strength applied");

    let (handle, endpoint) = EngineHandle::channel(64);
    let EngineEndpoint { commands, events } = endpoint;

    let reader_events = events.clone();
    tokio::spawn(async move {
        read_output(lines, reader_events).await;
    });
    tokio::spawn(async move {
        write_commands(process, stdin, commands, events).await;
    });

    tracing::info!("Stockfish engine spawned and initialized successfully");
    Ok(handle)
}

async fn wait_for_uciok(lines: &mut Lines<BufReader<ChildStdout>>) -> Result<(), EngineError> {
    while let Some(line) = lines.next_line().await? {
        tracing::trace!("UCI << {}", line.trim());
        if matches!(parse_uci_message(line.trim()), Ok(UciMessage::UciOk)) {
            tracing::debug!("Received uciok, engine ready");
            return Ok(());
        }
    }
    Err(EngineError::Handshake)
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<(), EngineError> {
    tracing::trace!("UCI >> {}", line.trim());
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

async fn read_output(
    mut lines: Lines<BufReader<ChildStdout>>,
    events: tokio::sync::mpsc::Sender<EngineEvent>,
) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                tracing::trace!("UCI << {}", trimmed);
                if events.send(EngineEvent::Output(trimmed.to_string())).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::warn!("Stockfish stdout EOF - engine closed");
                let _ = events.send(EngineEvent::Exited).await;
                break;
            }
            Err(e) => {
                tracing::error!("Error reading from Stockfish stdout: {}", e);
                let _ = events.send(EngineEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
    tracing::info!("Output reader task exiting");
}

async fn write_commands(
    mut process: Child,
    mut stdin: ChildStdin,
    mut commands: tokio::sync::mpsc::Receiver<EngineCommand>,
    events: tokio::sync::mpsc::Sender<EngineEvent>,
) {
    while let Some(cmd) = commands.recv().await {
        let quit = cmd == EngineCommand::Quit;
        if let Err(e) = write_line(&mut stdin, &cmd.to_uci()).await {
            tracing::error!("Failed to write to stdin: {}", e);
            let _ = events.send(EngineEvent::Error(e.to_string())).await;
            break;
        }
        if quit {
            tracing::info!("Sending quit command to engine");
            break;
        }
    }

    if tokio::time::timeout(QUIT_GRACE, process.wait()).await.is_err() {
        let _ = process.kill().await;
    }
    tracing::info!("Command writer task exiting");
}

/// Find Stockfish executable in common locations
fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish", // In PATH
    ];

    paths
        .into_iter()
        .find(|path_str| {
            let exists = Path::new(path_str).exists() || *path_str == "stockfish";
            exists && std::process::Command::new(path_str).arg("--help").output().is_ok()
        })
        .map(PathBuf::from)
}
