//! karaoke-engine - interactive playback demo
//!
//! Plays a vocal/accompaniment track pair and takes single-letter
//! commands on stdin to exercise the session lifecycle:
//!   v  switch to the vocal (original) track
//!   a  switch to the accompaniment track
//!   p  pause    r  resume    s  stop    q  quit

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use karaoke_engine::{EngineConfig, KaraokeSession, SessionState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the demo player
#[derive(Parser, Debug)]
#[command(name = "karaoke-engine")]
#[command(about = "Dual-track karaoke playback demo")]
#[command(version)]
struct Args {
    /// Vocal (original) track file
    #[arg(env = "KARAOKE_VOCAL")]
    vocal: PathBuf,

    /// Accompaniment track file
    #[arg(env = "KARAOKE_ACCOMPANIMENT")]
    accompaniment: PathBuf,

    /// Optional TOML config file
    #[arg(short, long, env = "KARAOKE_CONFIG")]
    config: Option<PathBuf>,

    /// Audio output device name (default device if omitted)
    #[arg(short, long, env = "KARAOKE_DEVICE")]
    device: Option<String>,

    /// Start with the vocal track audible instead of the accompaniment
    #[arg(long)]
    vocal_first: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "karaoke_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.device.is_some() {
        config.output_device = args.device.clone();
    }

    info!(
        "Playing vocal={} accompaniment={}",
        args.vocal.display(),
        args.accompaniment.display()
    );

    let session = KaraokeSession::new(config, &args.vocal, &args.accompaniment);
    session.set_active_track(args.vocal_first);

    let ready = session.prepare().context("Failed to begin prepare")?;
    ready
        .await
        .context("Prepare was cancelled")?
        .context("Failed to prepare tracks")?;
    info!("Tracks prepared");

    session.start().context("Failed to start playback")?;
    println!("playing - commands: v=vocal a=accompaniment p=pause r=resume s=stop q=quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "v" => session.set_active_track(true),
                    "a" => session.set_active_track(false),
                    "p" => {
                        if let Err(e) = session.pause() {
                            warn!("pause: {}", e);
                        }
                    }
                    "r" => {
                        if let Err(e) = session.resume() {
                            warn!("resume: {}", e);
                        }
                    }
                    "s" => {
                        if let Err(e) = session.stop() {
                            warn!("stop: {}", e);
                        }
                    }
                    "q" => break,
                    "" => {}
                    other => println!("unknown command: {}", other),
                }
                println!("state: {}", session.state());
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
        }

        if session.state() == SessionState::Stopped {
            break;
        }
    }

    session.release();
    info!("Session released");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
