// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use padforge::audio::{self, DefaultFetcher, PollLoop, SampleEngine, LEVEL_FLOOR};
use padforge::classify::{Classifier, StaticResponse};
use padforge::config::Settings;
use padforge::midi::{self, DeviceHub, Note, Transport};
use padforge::pads::{
    self, PadBank, PadController, PadIndex, PadUpdate, ProfileSet, ProfileUpdate,
};
use padforge::store::{self, FileStore, KeyValueStore, PAD_ASSIGNMENTS_KEY};
use padforge::util::{duration_minutes_seconds, filename_display};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI pad controller and sample engine."
)]
struct Cli {
    /// The path to a YAML config file. PADFORGE__* environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input/output devices.
    MidiDevices {},
    /// Prints every incoming MIDI message until interrupted.
    Monitor {},
    /// Sends a note to the MIDI outputs.
    SendNote {
        /// The note number.
        note: u8,
        #[arg(short, long)]
        velocity: Option<u8>,
        /// The channel (0-15). Defaults to the configured default channel.
        #[arg(short, long)]
        channel: Option<u8>,
        /// How long the note sounds, e.g. 200ms.
        #[arg(short, long)]
        duration: Option<String>,
        /// Only send to the output with this id.
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Sends a control change to the MIDI outputs.
    SendCc {
        /// The controller number.
        controller: u8,
        /// The value. Clamped to 0-127.
        #[arg(allow_negative_numbers = true)]
        value: f64,
        #[arg(short, long)]
        channel: Option<u8>,
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Sends one of the active profile's macros as a control change.
    SendMacro {
        /// The macro id.
        id: u32,
        /// The value. Clamped to 0-127.
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// Sends a transport command to the MIDI outputs.
    Transport {
        command: Transport,
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Plays a sample through the audio output.
    Play {
        /// A file path or URL.
        source: String,
        /// MIDI velocity (0-127).
        #[arg(short, long, default_value_t = 127)]
        velocity: u8,
        /// Transposition in semitones.
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        semitones: i32,
    },
    /// Prints the peak and RMS levels of a sample.
    Analyze {
        /// A file path or URL.
        source: String,
    },
    /// Manages MIDI profiles.
    Profiles {
        #[clap(subcommand)]
        command: ProfileCommands,
    },
    /// Manages pad assignments.
    Pads {
        #[clap(subcommand)]
        command: PadCommands,
    },
    /// Prints the categories of the assigned samples, read from a response saved
    /// from the classification service.
    Classify {
        /// The JSON response, a list of classified samples.
        response: PathBuf,
    },
    /// Replaces the pad assignments with a layout suggestion saved from the
    /// layout service.
    Layout {
        /// The JSON response, mapping pad numbers to sample names.
        response: PathBuf,
    },
    /// Exports the active profile and pad assignments as JSON.
    Export {
        /// The directory to write to.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Runs the pad controller until interrupted.
    Start {
        /// Prints a live output level meter.
        #[arg(short, long)]
        meter: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Lists every profile.
    List {},
    /// Creates a new profile and makes it active.
    Create {},
    /// Deletes a profile.
    Delete { id: String },
    /// Makes a profile active.
    Activate { id: String },
    /// Changes a profile.
    Set {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        channel: Option<u8>,
        #[arg(long)]
        base_note: Option<u8>,
        #[arg(long)]
        sync_out: Option<bool>,
    },
}

#[derive(Subcommand)]
enum PadCommands {
    /// Lists every assigned pad.
    List {},
    /// Assigns a sample to a pad.
    Assign { pad: PadIndex, sample: String },
    /// Removes a pad's assignment.
    Clear { pad: PadIndex },
    /// Changes a pad's settings.
    Set {
        pad: PadIndex,
        #[arg(long)]
        start: Option<f64>,
        #[arg(long)]
        end: Option<f64>,
        #[arg(long = "loop")]
        loop_enabled: Option<bool>,
        #[arg(long, allow_negative_numbers = true)]
        coarse: Option<i32>,
        #[arg(long, allow_negative_numbers = true)]
        fine: Option<i32>,
        #[arg(long)]
        mute_group: Option<String>,
    },
    /// Plays a pad and echoes its note to the MIDI outputs.
    Press { pad: PadIndex },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
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
        Commands::MidiDevices {} => {
            let hub = init_hub(&settings)?;
            if !hub.is_enabled() {
                return Err("MIDI is unavailable".into());
            }

            println!("Inputs:");
            for device in hub.inputs() {
                println!("- {} ({})", device, device.id());
            }
            println!("Outputs:");
            for device in hub.outputs() {
                println!("- {} ({})", device, device.id());
            }
        }
        Commands::Monitor {} => {
            let hub = init_hub(&settings)?;
            let _subscription = hub.on_message(|event| println!("{}", event));
            info!(inputs = hub.inputs().len(), "Monitoring MIDI, press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
        }
        Commands::SendNote {
            note,
            velocity,
            channel,
            duration,
            target,
        } => {
            let hub = init_hub(&settings)?;
            let duration: Duration = match duration {
                Some(duration) => duration_string::DurationString::from_string(duration)
                    .map_err(|e| e.to_string())?
                    .into(),
                None => settings.midi().note_duration()?,
            };

            let mut message = Note::new(note)
                .velocity(velocity.unwrap_or(settings.midi().note_velocity()))
                .duration(duration);
            if let Some(channel) = channel {
                message = message.channel(channel);
            }
            if let Some(target) = target.as_deref() {
                message = message.target(target);
            }
            hub.send_note(message);

            // Give the note-off time to go out.
            tokio::time::sleep(duration + Duration::from_millis(50)).await;
        }
        Commands::SendCc {
            controller,
            value,
            channel,
            target,
        } => {
            init_hub(&settings)?.send_control_change(controller, value, channel, target.as_deref());
        }
        Commands::SendMacro { id, value } => {
            init_controller(&settings)?.send_macro(id, value)?;
        }
        Commands::Transport { command, target } => {
            init_hub(&settings)?.send_transport(command, target.as_deref());
        }
        Commands::Play {
            source,
            velocity,
            semitones,
        } => {
            let engine = init_engine(&settings)?;
            let buffer = engine.load_sample(&source, &source)?;
            let pitch = 2f64.powf(semitones as f64 / 12.0);
            println!(
                "Playing {} ({})",
                filename_display(&source),
                duration_minutes_seconds(buffer.duration().div_f64(pitch))
            );

            engine.play_buffer(&buffer, velocity.min(127) as f32 / 127.0, pitch);
            tokio::time::sleep(buffer.duration().div_f64(pitch)).await;
            while engine.active_voices() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        Commands::Analyze { source } => {
            let engine = init_engine(&settings)?;
            let buffer = engine.load_sample(&source, &source)?;
            let features = engine.analyze_features(&buffer);
            println!("{}: {}", filename_display(&source), features);
        }
        Commands::Profiles { command } => {
            let store = open_store(&settings);
            let mut profiles = ProfileSet::load(store.as_ref());

            match command {
                ProfileCommands::List {} => {
                    for profile in profiles.profiles() {
                        let marker = if profile.id == profiles.active_id() { "*" } else { "-" };
                        println!(
                            "{} {} ({}): channel {}, base note {}, sync out {}",
                            marker,
                            profile.name,
                            profile.id,
                            profile.channel,
                            profile.pad_base_note,
                            profile.sync_out
                        );
                        for mapping in &profile.macros {
                            println!(
                                "    macro {} {}: CC {}",
                                mapping.id, mapping.label, mapping.control_number
                            );
                        }
                    }
                    return Ok(());
                }
                ProfileCommands::Create {} => {
                    println!("Created profile {}", profiles.create().id);
                }
                ProfileCommands::Delete { id } => profiles.delete(&id)?,
                ProfileCommands::Activate { id } => profiles.activate(&id)?,
                ProfileCommands::Set {
                    id,
                    name,
                    channel,
                    base_note,
                    sync_out,
                } => profiles.update(
                    &id,
                    ProfileUpdate {
                        name,
                        channel,
                        pad_base_note: base_note,
                        sync_out,
                        macros: None,
                    },
                )?,
            }
            profiles.save(store.as_ref())?;
        }
        Commands::Pads { command } => {
            if let PadCommands::Press { pad } = command {
                let controller = init_controller(&settings)?;
                controller.preload();
                controller.select_pad(pad);
                let note_duration = settings.pad_settings()?.note_duration;
                tokio::time::sleep(note_duration + Duration::from_millis(50)).await;
                while controller.engine().active_voices() > 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                return Ok(());
            }

            let store = open_store(&settings);
            let mut pads: PadBank = store::load_or_default(store.as_ref(), PAD_ASSIGNMENTS_KEY);
            match command {
                PadCommands::List {} => {
                    for (pad, assignment) in pads.assigned() {
                        println!(
                            "{:>2}: {} (trim {}-{}%, loop {}, tune {:+}/{:+}, mute group {})",
                            pad,
                            filename_display(&assignment.sample_path),
                            assignment.trim_start,
                            assignment.trim_end,
                            assignment.loop_enabled,
                            assignment.tune_coarse,
                            assignment.tune_fine,
                            assignment.mute_group
                        );
                    }
                    return Ok(());
                }
                PadCommands::Assign { pad, sample } => pads.assign(pad, &sample),
                PadCommands::Clear { pad } => {
                    pads.clear(pad);
                }
                PadCommands::Set {
                    pad,
                    start,
                    end,
                    loop_enabled,
                    coarse,
                    fine,
                    mute_group,
                } => pads.update(
                    pad,
                    PadUpdate {
                        sample_path: None,
                        trim_start: start,
                        trim_end: end,
                        loop_enabled,
                        tune_coarse: coarse,
                        tune_fine: fine,
                        mute_group,
                    },
                ),
                PadCommands::Press { .. } => {}
            }
            store::save(store.as_ref(), PAD_ASSIGNMENTS_KEY, &pads)?;
        }
        Commands::Classify { response } => {
            let store = open_store(&settings);
            let pads: PadBank = store::load_or_default(store.as_ref(), PAD_ASSIGNMENTS_KEY);
            let classifier = Classifier::new(Arc::new(StaticResponse::from_file(&response)?));

            if !classifier.classify(&pads.sample_paths()) {
                return Err("unable to read the classification".into());
            }
            for classification in classifier.results() {
                println!(
                    "{} [{}]: {}",
                    classification.name, classification.category, classification.reason
                );
            }
        }
        Commands::Layout { response } => {
            let store = open_store(&settings);
            let mut pads: PadBank = store::load_or_default(store.as_ref(), PAD_ASSIGNMENTS_KEY);
            let classifier = Classifier::new(Arc::new(StaticResponse::from_file(&response)?));

            let layout = classifier
                .suggest_layout(&pads.sample_paths())
                .ok_or("unable to read the layout suggestion")?;
            for (pad, sample) in layout.iter() {
                println!("{:>2}: {}", pad, sample);
            }
            pads.apply_layout(layout);
            store::save(store.as_ref(), PAD_ASSIGNMENTS_KEY, &pads)?;
        }
        Commands::Export { dir } => {
            let store = open_store(&settings);
            let profiles = ProfileSet::load(store.as_ref());
            let pads: PadBank = store::load_or_default(store.as_ref(), PAD_ASSIGNMENTS_KEY);
            let path = pads::export_config(&profiles.active(), &pads, &dir)?;
            println!("Exported to {}", path.display());
        }
        Commands::Start { meter } => {
            let controller = init_controller(&settings)?;
            if settings.pads().preload() {
                controller.preload();
            }
            controller.attach();

            let mut poll = if meter {
                let engine = controller.engine().clone();
                let lit = controller.clone();
                Some(PollLoop::start(
                    engine,
                    settings.audio().frame_interval()?,
                    move |frame| {
                        let peak = frame
                            .waveform
                            .iter()
                            .fold(0f32, |peak, sample| peak.max(sample.abs()));
                        let db = 20.0 * (peak as f64).max(LEVEL_FLOOR).log10();
                        let width = ((db + 60.0).clamp(0.0, 60.0) / 2.0) as usize;
                        let pads = lit
                            .flashing_pads()
                            .iter()
                            .map(|pad| pad.to_string())
                            .collect::<Vec<_>>()
                            .join(" ");
                        print!("\r{:>7.1} dB |{:<30}| {:<40}", db, "#".repeat(width), pads);
                        let _ = std::io::stdout().flush();
                    },
                ))
            } else {
                None
            };

            info!(
                profile = controller.active_profile().name,
                "Pad controller running, press Ctrl-C to stop."
            );
            tokio::signal::ctrl_c().await?;

            if let Some(poll) = poll.as_mut() {
                poll.cancel();
                println!();
            }
            controller.detach();
        }
    }

    Ok(())
}

fn init_hub(settings: &Settings) -> Result<Arc<DeviceHub>, Box<dyn Error>> {
    let config = settings.midi();
    let hub = Arc::new(DeviceHub::new(midi::get_host(
        config.host(),
        config.watch_interval()?,
    )));
    if !hub.initialize() {
        warn!("Continuing without MIDI.");
    }
    hub.set_default_channel(config.default_channel());
    Ok(hub)
}

fn init_engine(settings: &Settings) -> Result<Arc<SampleEngine>, Box<dyn Error>> {
    let config = settings.audio();
    let output = audio::get_output(&config)?;
    info!(output = output.to_string(), "Audio output ready.");
    let fetcher = Arc::new(DefaultFetcher::new(config.sample_root().map(Path::to_path_buf)));
    Ok(Arc::new(SampleEngine::new(
        output,
        fetcher,
        config.fft_size(),
        config.smoothing(),
    )?))
}

fn open_store(settings: &Settings) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::open(&settings.state()))
}

fn init_controller(settings: &Settings) -> Result<Arc<PadController>, Box<dyn Error>> {
    Ok(PadController::new(
        init_hub(settings)?,
        init_engine(settings)?,
        open_store(settings),
        settings.pad_settings()?,
    ))
}
