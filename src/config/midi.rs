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
use std::time::Duration;

use serde::Deserialize;

use super::error::{parse_duration, ConfigError};
use crate::midi::{DEFAULT_NOTE_DURATION, DEFAULT_NOTE_VELOCITY};

const DEFAULT_HOST: &str = "midir";
const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// A YAML representation of the MIDI configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Midi {
    /// The MIDI host, "midir" or "mock".
    host: Option<String>,

    /// The channel for sends that don't name one (0-15).
    default_channel: Option<u8>,

    /// Velocity of echoed pad notes (default: 100).
    note_velocity: Option<u8>,

    /// How long echoed pad notes sound (default: 200ms).
    note_duration: Option<String>,

    /// How often ports are polled for changes (default: 500ms).
    watch_interval: Option<String>,
}

impl Midi {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn default_channel(&self) -> u8 {
        self.default_channel.unwrap_or(0)
    }

    pub fn note_velocity(&self) -> u8 {
        self.note_velocity.unwrap_or(DEFAULT_NOTE_VELOCITY)
    }

    /// Returns the echoed note duration from the configuration.
    pub fn note_duration(&self) -> Result<Duration, ConfigError> {
        match &self.note_duration {
            Some(duration) => parse_duration("midi.note_duration", duration),
            None => Ok(DEFAULT_NOTE_DURATION),
        }
    }

    /// Returns the port watch interval from the configuration.
    pub fn watch_interval(&self) -> Result<Duration, ConfigError> {
        match &self.watch_interval {
            Some(interval) => parse_duration("midi.watch_interval", interval),
            None => Ok(DEFAULT_WATCH_INTERVAL),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_channel() > 15 {
            return Err(ConfigError::invalid(
                "midi.default_channel",
                format!("{} is not a channel between 0 and 15", self.default_channel()),
            ));
        }
        if self.note_velocity() > 127 {
            return Err(ConfigError::invalid(
                "midi.note_velocity",
                format!("{} is above 127", self.note_velocity()),
            ));
        }
        self.note_duration()?;
        self.watch_interval()?;
        Ok(())
    }
}
