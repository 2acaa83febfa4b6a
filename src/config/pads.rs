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

const DEFAULT_FLASH_DURATION: Duration = Duration::from_millis(100);

/// A YAML representation of the pad controller configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Pads {
    /// How long a pad stays lit after a trigger (default: 100ms).
    flash_duration: Option<String>,

    /// Whether assigned samples are loaded at startup (default: true).
    preload: Option<bool>,
}

impl Pads {
    pub fn flash_duration(&self) -> Result<Duration, ConfigError> {
        match &self.flash_duration {
            Some(duration) => parse_duration("pads.flash_duration", duration),
            None => Ok(DEFAULT_FLASH_DURATION),
        }
    }

    pub fn preload(&self) -> bool {
        self.preload.unwrap_or(true)
    }
}
