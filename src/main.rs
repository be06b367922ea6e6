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

use clap::{crate_version, Parser, Subcommand};
use keyvoice::config::InstrumentConfig;
use keyvoice::tuning::TuningTable;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A computer-keyboard sample instrument."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available scales and their steps.
    Scales {
        /// An instrument file whose declared scales should be listed too.
        #[arg(long)]
        instrument: Option<PathBuf>,
    },
    /// Shows the scale step a pitch fader value snaps to.
    Quantize {
        /// The name of the scale.
        scale: String,
        /// The fader value, within one octave (1 to 2).
        value: f64,
        /// An instrument file whose declared scales should be available.
        #[arg(long)]
        instrument: Option<PathBuf>,
    },
    /// Verifies an instrument file and lists its keyboards.
    Verify {
        /// The path to the instrument file.
        path: PathBuf,
    },
}

fn load_tunings(instrument: Option<&PathBuf>) -> Result<TuningTable, Box<dyn Error>> {
    match instrument {
        Some(path) => Ok(InstrumentConfig::deserialize(path)?.tunings()?),
        None => Ok(TuningTable::builtin()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scales { instrument } => {
            let tunings = load_tunings(instrument.as_ref())?;

            println!("Scales:");
            for name in tunings.names() {
                let Some(scale) = tunings.get(name) else {
                    continue;
                };
                let steps: Vec<String> = scale
                    .fractions()
                    .iter()
                    .map(|fraction| fraction.to_string())
                    .collect();
                if steps.is_empty() {
                    println!("- {} (unquantized)", name);
                } else {
                    println!("- {}: {}", name, steps.join(" "));
                }
            }
        }
        Commands::Quantize {
            scale,
            value,
            instrument,
        } => {
            let tunings = load_tunings(instrument.as_ref())?;
            let found = tunings
                .get(&scale)
                .ok_or_else(|| format!("no scale named {}", scale))?;

            let step = found.quantize(value)?;
            println!(
                "{} snaps to {} ({:.6})",
                value,
                found.step_label(&step)?,
                step.ratio
            );
        }
        Commands::Verify { path } => {
            let instrument = InstrumentConfig::deserialize(&path)?;
            instrument.validate()?;
            let tunings = instrument.tunings()?;
            let random = instrument.random_pitch()?;

            println!("Instrument {} is valid.", path.display());
            println!(
                "Random pitch range: {} to {}",
                random.min(),
                random.max()
            );
            for keyboard in instrument.keyboards() {
                println!(
                    "- {}{} ({} keys)",
                    keyboard.name(),
                    if keyboard.defaults() {
                        ", from defaults"
                    } else {
                        ""
                    },
                    keyboard.keys().len()
                );
                for (key, voice) in keyboard.keys() {
                    let tuning = match voice.tuning() {
                        Some(name) if tunings.get(name).is_none() => {
                            format!("{} (unknown, unquantized)", name)
                        }
                        Some(name) => name.to_string(),
                        None => "unquantized".to_string(),
                    };
                    println!(
                        "  - {}: {} [{}, pitch {}, octave {}, {}]",
                        key,
                        voice.sample().unwrap_or("no sample"),
                        voice.trigger_mode(),
                        voice.pitch(),
                        f64::from(voice.octave()),
                        tuning
                    );
                }
            }
        }
    }

    Ok(())
}
