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

//! The device hub: MIDI port enumeration, incoming event dispatch and outbound sends.

use std::{fmt, sync::Arc, time::Duration};

mod event;
mod hub;
mod midir;
pub mod mock;
mod scheduler;

pub use event::{
    clamp_cc_value, control_change, note_off, note_on, transport, MessageKind, MidiEvent,
    Transport,
};
pub use hub::{
    DeviceHub, MessageCallback, Note, Subscription, DEFAULT_NOTE_DURATION, DEFAULT_NOTE_VELOCITY,
};

/// Error types for MIDI operations.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI access denied: {0}")]
    AccessDenied(String),

    #[error("MIDI port error: {0}")]
    Port(String),

    #[error("MIDI connection error: {0}")]
    Connect(String),

    #[error("MIDI send error: {0}")]
    Send(String),

    #[error("MIDI encode error: {0}")]
    Encode(String),
}

/// Whether a port receives or transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A MIDI port as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    id: String,
    name: String,
    direction: Direction,
}

impl Device {
    pub fn new(id: &str, name: &str, direction: Direction) -> Device {
        Device {
            id: id.to_string(),
            name: name.to_string(),
            direction,
        }
    }

    /// Returns the opaque id of the port.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name of the port.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Input => "Input",
            Direction::Output => "Output",
        };
        write!(f, "{} ({}) [{}]", self.name, direction, self.id)
    }
}

/// Receives raw messages along with the id of the input they arrived on.
pub type InputHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Called whenever the set of available ports changes.
pub type StateHandler = Arc<dyn Fn() + Send + Sync>;

/// A host that may grant access to its MIDI system.
pub trait Host: Send + Sync {
    /// Requests access to the MIDI system, optionally including system exclusive messages.
    fn request_access(&self, sysex: bool) -> Result<Arc<dyn Access>, MidiError>;
}

/// Granted access to a host's MIDI system.
pub trait Access: Send + Sync {
    /// Lists the input ports.
    fn inputs(&self) -> Result<Vec<Device>, MidiError>;

    /// Lists the output ports.
    fn outputs(&self) -> Result<Vec<Device>, MidiError>;

    /// Replaces every existing input listener with the given handler on the given inputs.
    fn listen(&self, inputs: &[Device], handler: InputHandler) -> Result<(), MidiError>;

    /// Sends a raw message to the given output.
    fn send(&self, output: &Device, message: &[u8]) -> Result<(), MidiError>;

    /// Installs the handler invoked on every device connect or disconnect.
    fn on_state_change(&self, handler: StateHandler);
}

/// Gets the host with the given name. Names starting with "mock" produce a mock host.
pub fn get_host(name: &str, watch_interval: Duration) -> Arc<dyn Host> {
    if name.starts_with("mock") {
        return Arc::new(mock::Host::new());
    }

    Arc::new(midir::Host::new(watch_interval))
}
