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
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use super::error::{parse_duration, ConfigError};

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_FFT_SIZE: usize = 2048;
const DEFAULT_SMOOTHING: f32 = 0.8;
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The output device. "default" is the host's default output; names starting
    /// with "mock" produce a mock output.
    device: Option<String>,

    /// The analyser FFT size (default: 2048). Must be a power of two in 32-32768.
    fft_size: Option<usize>,

    /// Spectrum smoothing between 0 and 1 (default: 0.8).
    smoothing: Option<f32>,

    /// How often the level meter polls the taps (default: 16ms).
    frame_interval: Option<String>,

    /// The directory relative sample paths are resolved against.
    sample_root: Option<PathBuf>,
}

impl Audio {
    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size.unwrap_or(DEFAULT_FFT_SIZE)
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing.unwrap_or(DEFAULT_SMOOTHING)
    }

    /// Returns the tap polling interval from the configuration.
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        match &self.frame_interval {
            Some(interval) => parse_duration("audio.frame_interval", interval),
            None => Ok(DEFAULT_FRAME_INTERVAL),
        }
    }

    pub fn sample_root(&self) -> Option<&Path> {
        self.sample_root.as_deref()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let fft_size = self.fft_size();
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(ConfigError::invalid(
                "audio.fft_size",
                format!("{} is not a power of two between 32 and 32768", fft_size),
            ));
        }
        let smoothing = self.smoothing();
        if !(0.0..=1.0).contains(&smoothing) {
            return Err(ConfigError::invalid(
                "audio.smoothing",
                format!("{} is not between 0 and 1", smoothing),
            ));
        }
        self.frame_interval()?;
        Ok(())
    }
}
