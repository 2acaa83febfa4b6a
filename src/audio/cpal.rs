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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{error, info, span, warn, Level};

use super::{error::OutputError, mixer::AudioMixer};

type MixerSlot = Arc<RwLock<Option<Arc<AudioMixer>>>>;

enum Command {
    Resume(Sender<Result<(), OutputError>>),
    Shutdown,
}

/// An output stream on a cpal device. The stream itself lives on a dedicated
/// thread, since cpal streams can't move between threads, and is driven through
/// commands.
pub struct Output {
    name: String,
    host_id: cpal::HostId,
    channel_count: u16,
    sample_rate: u32,
    suspended: Arc<AtomicBool>,
    mixer: MixerSlot,
    command_tx: Sender<Command>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, {} Hz) ({})",
            self.name,
            self.channel_count,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

/// Lists the names of every output device on the default host.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| OutputError::NoDevice(e.to_string()))?;

    let mut names: Vec<String> = devices.filter_map(|device| device.name().ok()).collect();
    names.sort();
    Ok(names)
}

fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, OutputError> {
    if name.is_empty() || name == "default" {
        return host
            .default_output_device()
            .ok_or_else(|| OutputError::NoDevice("no default output device".to_string()));
    }

    host.output_devices()
        .map_err(|e| OutputError::NoDevice(e.to_string()))?
        .find(|device| device.name().is_ok_and(|device_name| device_name.trim() == name))
        .ok_or_else(|| OutputError::NoDevice(format!("no device found with name {}", name)))
}

impl Output {
    /// Opens the named device ("default" for the host default) with its default
    /// output configuration. The stream starts suspended.
    pub fn get(name: &str) -> Result<Output, OutputError> {
        let span = span!(Level::INFO, "open output (cpal)");
        let _enter = span.enter();

        let host = cpal::default_host();
        let device = find_device(&host, name)?;
        let device_name = device.name().unwrap_or_else(|_| name.to_string());
        let supported = device
            .default_output_config()
            .map_err(|e| OutputError::Config(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();

        let mixer: MixerSlot = Arc::new(RwLock::new(None));
        let suspended = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let output_thread = {
            let mixer = mixer.clone();
            let config = config.clone();
            thread::Builder::new()
                .name("audio-output".to_string())
                .spawn(move || {
                    let stream = match sample_format {
                        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer),
                        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer),
                        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer),
                        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, mixer),
                        other => Err(OutputError::Config(format!(
                            "unsupported sample format {:?}",
                            other
                        ))),
                    };
                    let stream = match stream {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    run_commands(stream, command_rx);
                })
                .map_err(|e| OutputError::Stream(e.to_string()))?
        };

        ready_rx.recv().map_err(|_| OutputError::Closed)??;

        info!(
            device = device_name,
            channels = config.channels,
            sample_rate = config.sample_rate.0,
            format = ?sample_format,
            "Audio output opened."
        );

        Ok(Output {
            name: device_name,
            host_id: host.id(),
            channel_count: config.channels,
            sample_rate: config.sample_rate.0,
            suspended,
            mixer,
            command_tx,
            output_thread: Some(output_thread),
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: MixerSlot,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() != data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                match mixer.read().as_ref() {
                    Some(mixer) => mixer.render(&mut scratch),
                    None => scratch.fill(0.0),
                }
                for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                    *dst = <T as cpal::Sample>::from_sample(src);
                }
            },
            |err| error!(err = err.to_string(), "CPAL output stream error."),
            None,
        )
        .map_err(|e| OutputError::Stream(e.to_string()))?;

    // Some hosts start streams on creation.
    if let Err(e) = stream.pause() {
        warn!(err = e.to_string(), "Unable to suspend new output stream.");
    }
    Ok(stream)
}

fn run_commands(stream: cpal::Stream, command_rx: Receiver<Command>) {
    for command in command_rx.iter() {
        match command {
            Command::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| OutputError::Stream(e.to_string()));
                let _ = reply.send(result);
            }
            Command::Shutdown => break,
        }
    }
}

impl super::Output for Output {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    fn resume(&self) -> Result<(), OutputError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.command_tx
            .send(Command::Resume(reply_tx))
            .map_err(|_| OutputError::Closed)?;
        reply_rx.recv().map_err(|_| OutputError::Closed)??;

        if self.suspended.swap(false, Ordering::Relaxed) {
            info!(device = self.name, "Audio output resumed.");
        }
        Ok(())
    }

    fn attach(&self, mixer: Arc<AudioMixer>) -> Result<(), OutputError> {
        if mixer.channel_count() != self.channel_count {
            return Err(OutputError::Config(format!(
                "mixer has {} channels, output has {}",
                mixer.channel_count(),
                self.channel_count
            )));
        }
        *self.mixer.write() = Some(mixer);
        Ok(())
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}
