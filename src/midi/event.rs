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

//! Semantic MIDI events and the outbound message encoders.

use std::fmt;
use std::str::FromStr;

use midly::{
    live::{LiveEvent, SystemRealtime},
    num::{u4, u7},
    MidiMessage,
};

use super::MidiError;

/// The kind of a channel message, derived from the high nibble of its status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn,
    NoteOff,
    ControlChange,
    Other,
}

/// A decoded incoming MIDI message. Events are handed to subscribers by reference
/// and are never stored by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    status: u8,
    data1: u8,
    data2: u8,
    origin: String,
}

impl MidiEvent {
    /// Creates a new event from its parts.
    pub fn new(status: u8, data1: u8, data2: u8, origin: &str) -> MidiEvent {
        MidiEvent {
            status,
            data1,
            data2,
            origin: origin.to_string(),
        }
    }

    /// Decodes a raw message as delivered by the host. Missing data bytes read as zero.
    /// Returns None for an empty message.
    pub fn from_raw(raw: &[u8], origin: &str) -> Option<MidiEvent> {
        let status = *raw.first()?;
        Some(MidiEvent::new(
            status,
            raw.get(1).copied().unwrap_or(0),
            raw.get(2).copied().unwrap_or(0),
            origin,
        ))
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn data1(&self) -> u8 {
        self.data1
    }

    pub fn data2(&self) -> u8 {
        self.data2
    }

    /// The id of the input device the event arrived on.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The message kind, from the high nibble of the status byte.
    pub fn kind(&self) -> MessageKind {
        match self.status >> 4 {
            0x9 => MessageKind::NoteOn,
            0x8 => MessageKind::NoteOff,
            0xB => MessageKind::ControlChange,
            _ => MessageKind::Other,
        }
    }

    /// The channel (0-15), from the low nibble of the status byte.
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    /// True for a note-on carrying a non-zero velocity.
    pub fn is_sounding_note_on(&self) -> bool {
        self.kind() == MessageKind::NoteOn && self.data2 > 0
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:02X} {:02X} ({:?}, channel {}) from {}",
            self.status,
            self.data1,
            self.data2,
            self.kind(),
            self.channel() + 1,
            self.origin
        )
    }
}

/// A system realtime transport command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    Start,
    Stop,
    Continue,
}

impl Transport {
    fn realtime(self) -> SystemRealtime {
        match self {
            Transport::Start => SystemRealtime::Start,
            Transport::Stop => SystemRealtime::Stop,
            Transport::Continue => SystemRealtime::Continue,
        }
    }
}

impl FromStr for Transport {
    type Err = MidiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Transport::Start),
            "stop" => Ok(Transport::Stop),
            "continue" => Ok(Transport::Continue),
            other => Err(MidiError::Encode(format!("unknown transport command {}", other))),
        }
    }
}

fn encode(event: LiveEvent) -> Result<Vec<u8>, MidiError> {
    // Choosing 8 here because that's what nodi does.
    let mut buf: Vec<u8> = Vec::with_capacity(8);
    event
        .write(&mut buf)
        .map_err(|e| MidiError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Encodes a note-on. Values are truncated to their MIDI bit widths.
pub fn note_on(channel: u8, note: u8, velocity: u8) -> Result<Vec<u8>, MidiError> {
    encode(LiveEvent::Midi {
        channel: u4::from(channel),
        message: MidiMessage::NoteOn {
            key: u7::from(note),
            vel: u7::from(velocity),
        },
    })
}

/// Encodes a note-off with zero release velocity.
pub fn note_off(channel: u8, note: u8) -> Result<Vec<u8>, MidiError> {
    encode(LiveEvent::Midi {
        channel: u4::from(channel),
        message: MidiMessage::NoteOff {
            key: u7::from(note),
            vel: u7::from(0),
        },
    })
}

/// Encodes a control change.
pub fn control_change(channel: u8, controller: u8, value: u8) -> Result<Vec<u8>, MidiError> {
    encode(LiveEvent::Midi {
        channel: u4::from(channel),
        message: MidiMessage::Controller {
            controller: u7::from(controller),
            value: u7::from(value),
        },
    })
}

/// Encodes a single-byte transport message.
pub fn transport(command: Transport) -> Result<Vec<u8>, MidiError> {
    encode(LiveEvent::Realtime(command.realtime()))
}

/// Floors and clamps a continuous controller value into the 0-127 range.
pub fn clamp_cc_value(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.floor().clamp(0.0, 127.0) as u8
}
