// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, TryFromFloatSecsError};

use clap::{crate_version, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use polyclick::audio::cpal::OutputDevice;
use polyclick::audio::render;
use polyclick::config;
use polyclick::Engine;

/// How often the monitor loop wakes up.
const MONITOR_INTERVAL: Duration = Duration::from_micros(16_667);

/// Monitor ticks between phase reports.
const REPORT_EVERY: u64 = 60;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyrhythm and polymeter click generator."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays a session through the default output device.
    Play {
        /// The path to the session config.
        config_path: PathBuf,
        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(short, long)]
        seconds: Option<f64>,
    },
    /// Renders a session to a stereo WAV file.
    Render {
        /// The path to the session config.
        config_path: PathBuf,
        /// The WAV file to write.
        output_path: PathBuf,
        /// The number of host bars to render.
        #[arg(short, long, default_value_t = 4)]
        bars: u32,
    },
    /// Verifies a session config and prints what it describes.
    Check {
        /// The path to the session config.
        config_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config_path,
            seconds,
        } => {
            let limit = play_limit(seconds)?;
            let session = config::load_session(&config_path)?;
            let device = OutputDevice::open_default(session.audio())?;
            let (engine, mixer) = Engine::new(session.engine_settings(device.sample_rate()));
            let output = device.start(mixer)?;

            engine.play()?;
            monitor(&engine, limit).await?;
            engine.stop()?;
            drop(output);
        }
        Commands::Render {
            config_path,
            output_path,
            bars,
        } => {
            let session = config::load_session(&config_path)?;
            let sample_rate = session.audio().sample_rate_or_default();
            let (engine, mut mixer) = Engine::new(session.engine_settings(sample_rate));
            engine.play()?;

            let frames = render::bars_to_frames(&engine.clock().snapshot(), bars);
            render::render_to_wav(&mut mixer, &output_path, frames)?;
            println!(
                "Rendered {} bars ({} frames) to {}",
                bars,
                frames,
                output_path.display()
            );
        }
        Commands::Check { config_path } => {
            let session = config::load_session(&config_path)?;
            println!("{} is valid:", config_path.display());
            print!("{}", session);
        }
    }

    Ok(())
}

/// Converts `--seconds` into a duration. Negative, non-finite and oversized values
/// are rejected.
fn play_limit(seconds: Option<f64>) -> Result<Option<Duration>, TryFromFloatSecsError> {
    seconds.map(Duration::try_from_secs_f64).transpose()
}

/// Wakes at roughly 60 Hz to read the layer phases and release retired resources,
/// until Ctrl-C or the optional deadline.
async fn monitor(engine: &Engine, limit: Option<Duration>) -> Result<(), Box<dyn Error>> {
    let mut interval = tokio::time::interval(MONITOR_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    info!("Playing, press Ctrl-C to stop");
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupted");
                return Ok(());
            }
            _ = &mut deadline => {
                return Ok(());
            }
            _ = interval.tick() => {
                engine.collect_garbage();
                ticks += 1;
                if ticks % REPORT_EVERY == 0 {
                    let phases: Vec<String> = engine
                        .layers()
                        .iter()
                        .map(|layer| format!("{}={:.3}", layer.id(), layer.bar_phase01()))
                        .collect();
                    debug!(
                        phases = %phases.join(" "),
                        metronome = engine.metronome().bar_phase01(),
                        "Bar phase"
                    );
                }
            }
        }
    }
}
