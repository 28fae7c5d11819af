//! bookmate - play against an opening book backed by a database and Stockfish.
//!
//! Moves and commands are read line by line from stdin; the opponent's
//! replies, evaluations and notices are printed as they happen.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bookmate::{config, spawn_session, SessionEvent, SessionHandle, SessionOptions};
use chess::{CompileOptions, PlayerColor, StartPosition};
use clap::{Parser, ValueEnum};
use engine::{spawn_stockfish, EngineConfig, EngineHandle, Strength};
use explorer::{LichessExplorer, OpeningDatabase};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "bookmate", about = "Play chess against a book-aware opponent")]
struct Cli {
    /// Opening repertoire to play from (PGN, variations allowed)
    #[arg(long)]
    pgn: Option<PathBuf>,

    /// Start from this position instead of the standard one
    #[arg(long)]
    fen: Option<String>,

    /// Side you play
    #[arg(long, value_enum, default_value_t = Side::White)]
    human: Side,

    /// Opponent strength (400-2800); defaults to BOOKMATE_ELO or 1200
    #[arg(long)]
    elo: Option<u16>,

    /// Never ask the opening database
    #[arg(long)]
    no_database: bool,

    /// Lowest rating bucket for database games (switches to the Lichess games database)
    #[arg(long)]
    rating_min: Option<u32>,

    /// Highest rating bucket for database games
    #[arg(long)]
    rating_max: Option<u32>,

    /// Seed for choosing among book and database moves
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    White,
    Black,
}

impl From<Side> for PlayerColor {
    fn from(side: Side) -> Self {
        match side {
            Side::White => PlayerColor::White,
            Side::Black => PlayerColor::Black,
        }
    }
}

const HELP: &str = "commands: <move> (SAN or UCI), back, forward, jump <n>, hint, eval, reset, help, quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with span durations; stdout is the game transcript
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let strength = cli.elo.map(Strength::from_elo).unwrap_or_else(config::get_strength);
    let mut filters = config::get_query_filters();
    filters.rating_min = cli.rating_min;
    filters.rating_max = cli.rating_max;
    let database_enabled = !cli.no_database && config::database_enabled();

    let start = cli.fen.clone().map_or(StartPosition::Standard, StartPosition::Fen);
    let book = match &cli.pgn {
        Some(path) => {
            let pgn = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let compile = CompileOptions {
                baseline: start.clone(),
            };
            let tree = chess::compile_with(&pgn, &compile)
                .with_context(|| format!("compiling {}", path.display()))?;
            println!("Loaded {} book positions from {}", tree.len(), path.display());
            Some(tree)
        }
        None => None,
    };

    let engine = start_engine(strength).await;
    let database: Option<Arc<dyn OpeningDatabase>> = if database_enabled {
        let explorer = LichessExplorer::new(config::get_explorer_url())?
            .with_token(config::get_explorer_token());
        Some(Arc::new(explorer))
    } else {
        None
    };

    let options = SessionOptions {
        start,
        human: cli.human.into(),
        strength,
        filters,
        database_enabled,
        opponent_delay: config::get_opponent_delay(),
        seed: cli.seed,
    };
    let session = spawn_session(options, engine, database, book)?;
    let (snapshot, mut events) = session.subscribe().await?;
    println!("{}", HELP);
    println!("Position: {}", snapshot.fen);

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Err(e) = run_command(&session, line).await {
            println!("! {}", e);
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn start_engine(strength: Strength) -> Option<EngineHandle> {
    let config = EngineConfig {
        path: config::get_stockfish_path(),
        strength,
        ..Default::default()
    };
    match spawn_stockfish(&config).await {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!("Engine unavailable: {}", e);
            println!("! No engine ({}); the opponent can only play book and database moves", e);
            None
        }
    }
}

async fn run_command(session: &SessionHandle, line: &str) -> anyhow::Result<()> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    match command {
        "back" | "b" => show_position(&session.step_back().await?),
        "forward" | "f" => show_position(&session.step_forward().await?),
        "jump" | "j" => {
            let index: isize = words
                .next()
                .context("usage: jump <ply index, -1 for start>")?
                .parse()?;
            show_position(&session.jump_to(index).await?);
        }
        "hint" => session.show_candidates(engine::MAX_ANALYSIS_LINES).await?,
        "eval" => {
            let snapshot = session.get_snapshot().await?;
            match snapshot.evaluation {
                Some(pawns) => println!("Evaluation: {:+.2}", pawns),
                None => println!("No evaluation yet"),
            }
        }
        "reset" => show_position(&session.reset().await?),
        "help" => println!("{}", HELP),
        text => {
            let snapshot = session.get_snapshot().await?;
            let board = chess::parse_fen(&snapshot.fen)?;
            let mv = match chess::pgn::parse_san(&board, text) {
                Ok(mv) => mv,
                Err(_) => chess::parse_uci_move(text)
                    .with_context(|| format!("not a move or command: {} ({})", text, HELP))?,
            };
            let snapshot = session.make_move(mv).await?;
            if let Some(last) = snapshot.history.last() {
                println!("You played {}", last.san);
            }
        }
    }
    Ok(())
}

fn show_position(snapshot: &bookmate::SessionSnapshot) {
    let state = if snapshot.reviewing { "reviewing" } else { "live" };
    println!(
        "[{} {}/{}] {} ({} to move, source: {})",
        state,
        snapshot.cursor,
        snapshot.move_count() as isize - 1,
        snapshot.fen,
        chess::format_color(snapshot.side_to_move.into()),
        snapshot.mode
    );
}

fn print_event(event: SessionEvent) {
    match event {
        SessionEvent::OpponentMoved(record) => {
            println!("Opponent plays {} ({:?})", record.san, record.origin);
        }
        SessionEvent::Evaluation(pawns) => tracing::debug!("Evaluation {:+.2}", pawns),
        SessionEvent::Candidates(lines) => {
            for line in lines {
                let score = line.score.map(|s| s.display()).unwrap_or_default();
                println!("  {}. {} {}", line.multipv, score, line.pv.join(" "));
            }
        }
        SessionEvent::GameOver(reason) => println!("{}", reason),
        SessionEvent::Notice(text) => println!("* {}", text),
        SessionEvent::Error(text) => println!("! {}", text),
        SessionEvent::StateChanged(_) => {}
    }
}
