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
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use airloops::audio;
use airloops::config::{self, Ensemble};
use airloops::controller::{keyboard, Controller};
use airloops::playback::playback_rate;
use airloops::player::Player;
use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A generative ambient player built from drifting sample loops."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays an ensemble. Press enter to start or stop it.
    Play {
        /// The path to the ensemble config. Plays the built-in ensemble if omitted.
        config: Option<PathBuf>,
        /// Overrides the configured audio device.
        #[arg[short, long]]
        device: Option<String>,
    },
    /// Lists every loop of an ensemble with the sample it will play.
    Loops {
        /// The path to the ensemble config. Uses the built-in ensemble if omitted.
        config: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Writes the built-in ensemble to a file as a starting point.
    Init {
        /// Where to write the ensemble config.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { config, device } => {
            let mut ensemble = config::load(config.as_deref())?;
            if let Some(device) = device {
                let mut audio = ensemble.audio();
                audio.set_device(&device);
                ensemble.set_audio(audio);
            }

            let player = Arc::new(Player::from_ensemble(&ensemble).await?);
            println!("Loops (count: {}):", player.loops().len());
            for lp in player.loops().iter() {
                println!("- {}", lp);
            }
            println!();

            Controller::new(player, Arc::new(keyboard::Driver::new()))
                .join()
                .await?;
        }
        Commands::Loops { config } => {
            let ensemble = config::load(config.as_deref())?;
            print_loops(&ensemble)?;
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Init { path } => {
            if path.exists() {
                return Err(format!("{} already exists", path.display()).into());
            }
            fs::write(&path, serde_yml::to_string(&Ensemble::default_ensemble()?)?)?;
            println!("Wrote the default ensemble to {}.", path.display());
        }
    }

    Ok(())
}

/// Prints each loop with its nearest sample, semitone offset and playback rate.
fn print_loops(ensemble: &Ensemble) -> Result<(), Box<dyn Error>> {
    let bank = ensemble.sample_bank()?;
    let loops = ensemble.loops()?;

    println!("Samples path: {}", ensemble.samples_path().display());
    println!("Loops (count: {}):", loops.len());
    for lp in loops.iter() {
        let Some(sample) = bank.nearest_sample(&lp.instrument, &lp.note) else {
            return Err(format!("no samples for instrument {}", lp.instrument).into());
        };
        let offset = lp.note.distance(sample.note());
        println!(
            "- {}: {} shifted {:+} semitones, rate {:.4}",
            lp,
            sample,
            offset,
            playback_rate(offset)
        );
    }
    Ok(())
}
