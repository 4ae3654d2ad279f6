use std::env;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use futures::StreamExt;
use tempo_ops::{init_tracing, EventJournal};
use tempo_rules::ShakmatyOracle;
use tempo_session::GameSession;
use tempo_transport::LocalTransport;
use tempo_types::{
    board::{PieceColor, Square},
    clock::{ClockSnapshot, TimeControl},
    config::{ClockConfig, OpsConfig, SessionConfig, TempoConfig, TransportConfig},
    events::{ServerEvent, ServerMessage},
    game::{MatchState, Move, RatingDeltas},
};
use tokio::time::{sleep, Duration};
use tracing::info;

const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Demo client: plays a short scripted match against an in-process server.
#[derive(Parser)]
#[command(name = "tempo-cli", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args);
    init_tracing(&config.ops)?;

    let (transport, server) = LocalTransport::new(64);
    let journal = EventJournal::new();
    let mut session = GameSession::new(ShakmatyOracle::new(), transport, &config);

    // Mirror every outbound command into the journal.
    let outbound_journal = journal.clone();
    let mut outbound = server.outbound();
    let outbound_task = tokio::spawn(async move {
        while let Some(message) = outbound.next().await {
            info!(command = ?message.command, "client submitted");
            outbound_journal.record_outbound(message).await;
        }
    });

    let time_control = TimeControl::rapid();
    let now = Utc::now();
    let join = ServerMessage::new(ServerEvent::Joined {
        position: INITIAL_FEN.into(),
        state: MatchState::Active,
        clock: ClockSnapshot {
            white_ms: time_control.base_ms,
            black_ms: time_control.base_ms,
            increment_ms: time_control.increment_ms,
            active: PieceColor::White,
            issued_at: now,
        },
        player: PieceColor::White,
    });
    journal.record_inbound(join.clone()).await;
    session.handle_message(join, now).await?;

    // Open with 1.e4 and queue a knight premove for the reply.
    session
        .try_move(Move::new(sq("e2")?, sq("e4")?), Utc::now())
        .await?;
    session.premove(sq("g1")?, sq("f3")?);
    info!(queued = session.premove_count(), "premove queued");

    // Script the rest of the match from the server side.
    let script_journal = journal.clone();
    let script = tokio::spawn(async move {
        let reply = Utc::now();
        let events = vec![
            ServerEvent::OpponentMoved {
                mv: Move::new(
                    Square::new(4, 6), // e7
                    Square::new(4, 4), // e5
                ),
            },
            ServerEvent::ClockSync(ClockSnapshot {
                white_ms: time_control.base_ms - 800,
                black_ms: time_control.base_ms - 1_500,
                increment_ms: time_control.increment_ms,
                active: PieceColor::Black,
                issued_at: reply,
            }),
            ServerEvent::Resigned {
                by: PieceColor::Black,
                rating_deltas: Some(RatingDeltas {
                    white: 8,
                    black: -8,
                }),
            },
        ];
        for event in events {
            sleep(Duration::from_millis(150)).await;
            let message = ServerMessage::new(event);
            script_journal.record_inbound(message.clone()).await;
            server.emit(message);
        }
    });

    // Runs until the server confirms the match end.
    session.run().await?;
    script
        .await
        .map_err(|err| anyhow::anyhow!("server script task failed: {err}"))?;
    // Let the outbound mirror flush before tearing it down.
    sleep(Duration::from_millis(50)).await;
    outbound_task.abort();

    journal.record_notices(session.drain_notices()).await;
    print_summary(&session, &journal).await;
    Ok(())
}

fn sq(text: &str) -> Result<Square> {
    Ok(text.parse()?)
}

async fn print_summary(
    session: &GameSession<ShakmatyOracle, LocalTransport>,
    journal: &EventJournal,
) {
    println!("match finished: {:?}", session.state());
    println!("moves played: {}", session.history().len());
    for record in session.history().records() {
        println!(
            "  ply {:>2} {:?} {} -> {}",
            record.ply, record.by, record.mv.from, record.mv.to
        );
    }
    println!(
        "journal: {} server events, {} client commands, {} notices",
        journal.inbound_snapshot().await.len(),
        journal.outbound_snapshot().await.len(),
        journal.notices_snapshot().await.len()
    );
}

fn load_config(args: &Cli) -> TempoConfig {
    let from_env = env::var("TEMPO_CONFIG").ok();
    let path = args
        .config
        .clone()
        .or(from_env)
        .unwrap_or_else(|| "configs/dev.toml".into());
    match TempoConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!("Invalid config in '{path}': {err}. Falling back to internal defaults.");
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!("Failed to load config from '{path}': {err}. Falling back to internal defaults.");
            default_config()
        }
    }
}

fn default_config() -> TempoConfig {
    let config = TempoConfig {
        clock: ClockConfig::default(),
        transport: TransportConfig {
            endpoint: "local://demo".into(),
            auth_token: None,
        },
        session: SessionConfig::default(),
        ops: OpsConfig {
            log_level: "info".into(),
        },
    };
    debug_assert!(config.validate().is_ok());
    config
}
