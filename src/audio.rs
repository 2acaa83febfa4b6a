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

//! The sample engine: decoding, voice playback and live analysis taps.

use std::{fmt, sync::Arc};

use crate::config;

mod analyser;
mod buffer;
pub mod cpal;
mod decode;
mod engine;
mod error;
mod features;
mod fetch;
mod mixer;
pub mod mock;
mod poll;
mod voice;

pub use buffer::SampleBuffer;
pub use engine::SampleEngine;
pub use error::{DecodeError, OutputError};
pub use features::{analyze_features, FeatureSnapshot, LEVEL_FLOOR};
pub use fetch::{DefaultFetcher, Fetcher};
pub use mixer::AudioMixer;
pub use poll::{PollLoop, TapFrame};

/// An audio output the engine renders into.
pub trait Output: fmt::Display + Send + Sync {
    fn sample_rate(&self) -> u32;

    fn channel_count(&self) -> u16;

    /// Returns true while the output isn't rendering, e.g. before first use.
    fn is_suspended(&self) -> bool;

    /// Starts or restarts rendering.
    fn resume(&self) -> Result<(), OutputError>;

    /// Sets the mixer that renders every block from now on.
    fn attach(&self, mixer: Arc<AudioMixer>) -> Result<(), OutputError>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    cpal::list_devices()
}

/// Gets the output configured in the given settings. Device names starting with
/// "mock" produce a mock output.
pub fn get_output(config: &config::Audio) -> Result<Arc<dyn Output>, OutputError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Output::get(device)));
    }

    Ok(Arc::new(cpal::Output::get(device)?))
}
