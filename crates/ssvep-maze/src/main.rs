//! SSVEP maze: simulated EEG -> FBCCA classification -> maze navigation
//!
//! A simulated user gazes at the stimulus for the next command of a route;
//! every confident classification moves the player through the maze.

mod maze;
mod session;

use anyhow::{bail, Context, Result};
use clap::Parser;
use maze::{Maze, MazeConfig, MazeGame, MoveOutcome, DEFAULT_MAP};
use session::{start_online_session, SessionCommand, SessionConfig};
use ssvep_core::Command;
use ssvep_processing::{ClassifierConfig, FbccaClassifier};
use ssvep_simulation::{start_eeg_stream, EegSimConfig, GazePattern, NoiseConfig, StreamCommand, StreamConfig};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ssvep-maze", version, about = "Drive a maze with simulated SSVEP EEG")]
struct Args {
    /// Text maze map ('#' wall, '.' free); the built-in map when omitted
    #[arg(long)]
    maze: Option<PathBuf>,

    /// Classifier configuration (JSON); the online profile when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Commands the simulated user attends to, in order
    #[arg(long, value_delimiter = ',', default_value = "down,down,down,down,down,down,down")]
    route: Vec<Command>,

    /// Simulated EEG channels
    #[arg(long, default_value_t = 8)]
    channels: usize,

    /// Background noise standard deviation (µV)
    #[arg(long, default_value_t = 5.0)]
    noise: f64,

    /// Factor applied to every window before classification
    #[arg(long, default_value_t = 1.0)]
    input_scale: f64,

    /// Seconds between classifications
    #[arg(long, default_value_t = 0.5)]
    interval: f64,

    /// Simulation speed relative to real time
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 120.0)]
    timeout: f64,

    /// Simulator seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the classifier configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

/// `--timeout` as a duration; must be finite and non-negative
fn run_timeout(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("--timeout must be a non-negative number of seconds, got {}", seconds))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let classifier_config = match &args.config {
        Some(path) => ClassifierConfig::load(path)
            .with_context(|| format!("Failed to load classifier config {}", path.display()))?,
        None => ClassifierConfig::online(),
    };

    if let Some(path) = &args.write_config {
        classifier_config
            .save(path)
            .with_context(|| format!("Failed to write classifier config {}", path.display()))?;
        info!("Classifier configuration written to {}", path.display());
        return Ok(());
    }

    if !args.speed.is_finite() || args.speed <= 0.0 {
        bail!("--speed must be positive, got {}", args.speed);
    }
    let timeout = run_timeout(args.timeout)?;

    let maze = match &args.maze {
        Some(path) => Maze::load(path).with_context(|| format!("Failed to load maze {}", path.display()))?,
        None => Maze::parse(DEFAULT_MAP)?,
    };
    let mut game = MazeGame::new(maze, MazeConfig::default())?;
    info!(
        "Maze {}x{} tiles, start at {:?}, route {:?}",
        game.maze().width(),
        game.maze().height(),
        game.start(),
        args.route
    );

    let layout = classifier_config.layout.clone();
    let gaze_for = |step: usize| match args.route.get(step) {
        Some(&command) => GazePattern::toward(&layout, command),
        None => GazePattern::Idle,
    };

    let stream_config = StreamConfig {
        sim_config: EegSimConfig {
            sampling_rate: classifier_config.sampling_rate,
            channel_count: args.channels,
            gaze: gaze_for(0),
            noise: NoiseConfig {
                gaussian_std: args.noise,
                ..Default::default()
            },
            seed: args.seed,
            ..Default::default()
        },
        update_rate: 10.0 * args.speed,
        ..Default::default()
    };
    let stream = start_eeg_stream(stream_config)?;

    let classifier = FbccaClassifier::new(classifier_config)?;
    let session_config = SessionConfig {
        classify_interval: args.interval / args.speed,
        input_scale: args.input_scale,
        ..Default::default()
    };
    let mut session = start_online_session(classifier, stream.data, args.channels, session_config)?;

    stream.control.send(StreamCommand::Start).await?;
    session.control.send(SessionCommand::Start).await?;

    let deadline = Instant::now() + timeout;
    let mut step = 0;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {
                warn!("Maze not solved within {}s", args.timeout);
                break;
            }

            event = session.events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} classifications", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Online session ended");
                        break;
                    }
                };

                if !event.decision.is_decided() {
                    debug!("No decision, best score {:?}", event.best_score);
                    continue;
                }

                let outcome = game.apply(event.command);
                info!(
                    "{} ({:?}Hz, score {:.2}) -> {:?}, now at {:?}",
                    event.command,
                    event.frequency,
                    event.best_score.unwrap_or_default(),
                    outcome,
                    game.position()
                );

                match outcome {
                    MoveOutcome::Won { .. } | MoveOutcome::Finished => break,
                    MoveOutcome::Moved { .. } if args.route.get(step) == Some(&event.command) => {
                        step += 1;
                        stream.control.send(StreamCommand::SetGaze(gaze_for(step))).await?;
                    }
                    _ => {}
                }

                // Every move needs a window recorded after it
                session.control.send(SessionCommand::ClearBuffer).await?;
            }
        }
    }

    let stats = session.stats.lock().await.clone();
    session.control.send(SessionCommand::Shutdown).await.ok();
    stream.control.send(StreamCommand::Shutdown).await.ok();

    println!("{}", game);
    info!(
        "{} classifications, {:.0}% decided, {}us average latency",
        stats.classifications,
        stats.decision_rate() * 100.0,
        stats.average_latency_us
    );

    if !game.is_won() {
        bail!("maze not solved after {} moves", game.moves());
    }
    info!("Maze solved in {} moves", game.moves());
    Ok(())
}
