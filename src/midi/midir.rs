// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
    collections::HashMap,
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use super::{Device, Direction, InputHandler, MidiError, StateHandler};

const CLIENT_NAME: &str = "padforge";

/// The host's MIDI system, through midir.
pub struct Host {
    watch_interval: Duration,
}

impl Host {
    /// Creates a host that polls for device changes at the given interval.
    pub fn new(watch_interval: Duration) -> Host {
        Host { watch_interval }
    }
}

impl super::Host for Host {
    fn request_access(&self, sysex: bool) -> Result<Arc<dyn super::Access>, MidiError> {
        let span = span!(Level::INFO, "request access (midir)");
        let _enter = span.enter();

        // Opening a client is the closest midir has to a permission check.
        new_input(sysex)?;
        MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::AccessDenied(e.to_string()))?;

        info!(sysex, "MIDI access granted.");
        Ok(Arc::new(Access {
            sysex,
            watch_interval: self.watch_interval,
            connections: Mutex::new(Vec::new()),
            outputs: Mutex::new(HashMap::new()),
            watching: Arc::new(AtomicBool::new(false)),
        }))
    }
}

fn new_input(sysex: bool) -> Result<MidiInput, MidiError> {
    let mut input =
        MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::AccessDenied(e.to_string()))?;
    if sysex {
        input.ignore(Ignore::None);
    }
    Ok(input)
}

fn list(direction: Direction) -> Result<Vec<Device>, MidiError> {
    match direction {
        Direction::Input => {
            let input = MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::Port(e.to_string()))?;
            input
                .ports()
                .iter()
                .map(|port| {
                    let name = input
                        .port_name(port)
                        .map_err(|e| MidiError::Port(e.to_string()))?;
                    Ok(Device::new(&port.id(), &name, Direction::Input))
                })
                .collect()
        }
        Direction::Output => {
            let output =
                MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Port(e.to_string()))?;
            output
                .ports()
                .iter()
                .map(|port| {
                    let name = output
                        .port_name(port)
                        .map_err(|e| MidiError::Port(e.to_string()))?;
                    Ok(Device::new(&port.id(), &name, Direction::Output))
                })
                .collect()
        }
    }
}

/// The ids of every port, used to detect connects and disconnects.
fn port_ids() -> Vec<String> {
    let mut ids: Vec<String> = [Direction::Input, Direction::Output]
        .into_iter()
        .flat_map(|direction| list(direction).unwrap_or_default())
        .map(|device| device.id().to_string())
        .collect();
    ids.sort();
    ids
}

/// Granted access through midir.
pub struct Access {
    sysex: bool,
    watch_interval: Duration,
    connections: Mutex<Vec<MidiInputConnection<()>>>,
    outputs: Mutex<HashMap<String, MidiOutputConnection>>,
    watching: Arc<AtomicBool>,
}

impl super::Access for Access {
    fn inputs(&self) -> Result<Vec<Device>, MidiError> {
        list(Direction::Input)
    }

    fn outputs(&self) -> Result<Vec<Device>, MidiError> {
        list(Direction::Output)
    }

    fn listen(&self, inputs: &[Device], handler: InputHandler) -> Result<(), MidiError> {
        let mut connections = self.connections.lock();

        // Explicitly drop the old connections so no input has two listeners.
        mem::drop(mem::take(&mut *connections));

        for device in inputs {
            let input = new_input(self.sysex)?;
            let port = match input.find_port_by_id(device.id().to_string()) {
                Some(port) => port,
                None => {
                    warn!(device = device.name(), "MIDI input disappeared before connecting.");
                    continue;
                }
            };

            let handler = handler.clone();
            let device_id = device.id().to_string();
            match input.connect(
                &port,
                "padforge input",
                move |_, raw, _| handler(&device_id, raw),
                (),
            ) {
                Ok(connection) => {
                    debug!(device = device.name(), "Listening to MIDI input.");
                    connections.push(connection);
                }
                Err(e) => warn!(
                    device = device.name(),
                    err = e.to_string(),
                    "Unable to connect to MIDI input."
                ),
            }
        }

        Ok(())
    }

    fn send(&self, output: &Device, message: &[u8]) -> Result<(), MidiError> {
        let mut outputs = self.outputs.lock();

        if !outputs.contains_key(output.id()) {
            let midi_output =
                MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Connect(e.to_string()))?;
            let port = midi_output
                .find_port_by_id(output.id().to_string())
                .ok_or_else(|| MidiError::Port(format!("{} is not connected", output.name())))?;
            let connection = midi_output
                .connect(&port, "padforge output")
                .map_err(|e| MidiError::Connect(e.to_string()))?;
            outputs.insert(output.id().to_string(), connection);
        }

        let result = match outputs.get_mut(output.id()) {
            Some(connection) => connection
                .send(message)
                .map_err(|e| MidiError::Send(e.to_string())),
            None => Err(MidiError::Port(output.name().to_string())),
        };

        // A failed connection is reopened on the next send.
        if result.is_err() {
            outputs.remove(output.id());
        }
        result
    }

    fn on_state_change(&self, handler: StateHandler) {
        if self.watching.swap(true, Ordering::SeqCst) {
            warn!("Already watching MIDI device changes.");
            return;
        }

        let watching = self.watching.clone();
        let interval = self.watch_interval;
        if let Err(e) = thread::Builder::new()
            .name("midi-watcher".to_string())
            .spawn(move || {
                let mut known = port_ids();
                while watching.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    let current = port_ids();
                    if current != known {
                        info!(ports = current.len(), "MIDI devices changed.");
                        known = current;
                        handler();
                    }
                }
            })
        {
            error!(err = e.to_string(), "Unable to start the MIDI device watcher.");
        }
    }
}

impl Drop for Access {
    fn drop(&mut self) {
        self.watching.store(false, Ordering::Relaxed);
    }
}
