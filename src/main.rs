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
mod audio;
mod board;
mod dispatch;
mod keybinds;
mod library;
mod scanner;
mod settings;
mod watcher;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};

use crate::audio::DevicePair;
use crate::board::Soundboard;
use crate::dispatch::Dispatcher;
use crate::scanner::FsScanner;
use crate::settings::SettingsStore;
use crate::watcher::FolderWatcher;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A hotkey-driven soundboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the clips in the given folder with their keybinds and volumes.
    Clips {
        /// The path to the clips folder.
        folder: String,
    },
    /// Lists the available audio input and output devices.
    Devices {},
    /// Plays a single clip once through the selected devices.
    Play {
        /// The path to the clips folder.
        folder: String,
        /// The file name of the clip to play.
        filename: String,
        /// The device the listener channel plays to, e.g. a virtual cable.
        /// Defaults to the system default input device's name.
        #[arg(short, long)]
        input_device: Option<String>,
        /// The device the user channel plays to. Defaults to the system
        /// default output device.
        #[arg(short, long)]
        output_device: Option<String>,
    },
    /// Start will start the soundboard: folder watching plus hotkey dispatch.
    Start {
        /// The path to the clips folder. Created if it doesn't exist yet.
        folder: String,
        /// The device the listener channel plays to, e.g. a virtual cable.
        #[arg(short, long)]
        input_device: Option<String>,
        /// The device the user channel plays to.
        #[arg(short, long)]
        output_device: Option<String>,
    },
}

/// Resolves the device pair, falling back to the host defaults for any
/// device not given explicitly.
fn resolve_device_pair(
    input: Option<String>,
    output: Option<String>,
) -> Result<DevicePair, Box<dyn Error>> {
    if let (Some(input), Some(output)) = (&input, &output) {
        return Ok(DevicePair {
            input: input.clone(),
            output: output.clone(),
        });
    }

    let defaults = audio::default_device_pair()?;
    Ok(DevicePair {
        input: input.unwrap_or(defaults.input),
        output: output.unwrap_or(defaults.output),
    })
}

/// Builds the engine over the real filesystem collaborators.
fn build_board(folder: &str, devices: DevicePair) -> Result<Arc<Soundboard>, Box<dyn Error>> {
    let folder = PathBuf::from(folder);
    let store = SettingsStore::in_folder(&folder);
    let device = audio::get_device(&devices.output)?;

    Ok(Arc::new(Soundboard::new(
        folder,
        Arc::new(FsScanner::new()),
        store,
        device,
        devices,
    )))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clips { folder } => {
            let board = build_board(
                &folder,
                DevicePair {
                    input: String::new(),
                    output: String::new(),
                },
            )?;
            board.refresh().await?;

            let clips = board.clips();
            if clips.is_empty() {
                println!("No clips found in {}.", folder.as_str());
                return Ok(());
            }

            println!("Clips (count: {}):", clips.len());
            for clip in clips {
                println!("- {}", clip);
            }
        }
        Commands::Devices {} => {
            let (inputs, outputs) = audio::list_devices()?;

            if inputs.is_empty() && outputs.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Input devices:");
            for device in inputs {
                println!("- {}", device);
            }
            println!("\nOutput devices:");
            for device in outputs {
                println!("- {}", device);
            }
        }
        Commands::Play {
            folder,
            filename,
            input_device,
            output_device,
        } => {
            let devices = resolve_device_pair(input_device, output_device)?;
            let board = build_board(&folder, devices)?;
            board.refresh().await?;

            let clip = board
                .clip(&filename)
                .ok_or_else(|| format!("no clip named {} in {}", filename, folder))?;
            let request = board.play_request(&clip);
            let device = board.device();
            tokio::task::spawn_blocking(move || device.play(&request)).await??;
        }
        Commands::Start {
            folder,
            input_device,
            output_device,
        } => {
            // Bootstrap the clips folder so dropping files in is all a new
            // user has to do.
            fs::create_dir_all(&folder)?;

            let devices = resolve_device_pair(input_device, output_device)?;
            let board = build_board(&folder, devices)?;
            board.refresh().await?;

            let _watcher = FolderWatcher::new(board.clone())?;
            let driver = Arc::new(dispatch::keyboard::Driver::new());
            let mut dispatcher = Dispatcher::new(board, driver);
            dispatcher.join().await?;
        }
    }

    Ok(())
}
