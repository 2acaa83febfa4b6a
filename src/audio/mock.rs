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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tracing::info;

use super::{error::OutputError, mixer::AudioMixer};

/// A mock output. Doesn't actually play anything; blocks are only rendered when
/// [Output::render] is called. Starts suspended, like a freshly created browser
/// audio context.
pub struct Output {
    name: String,
    channel_count: u16,
    sample_rate: u32,
    suspended: AtomicBool,
    resumes: AtomicUsize,
    mixer: RwLock<Option<Arc<AudioMixer>>>,
}

impl Output {
    /// Gets the given mock output.
    pub fn get(name: &str) -> Output {
        Output::with_format(name, 2, 44100)
    }

    pub fn with_format(name: &str, channel_count: u16, sample_rate: u32) -> Output {
        Output {
            name: name.to_string(),
            channel_count,
            sample_rate,
            suspended: AtomicBool::new(true),
            resumes: AtomicUsize::new(0),
            mixer: RwLock::new(None),
        }
    }

    /// Renders the given number of frames through the attached mixer.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        match self.mixer.read().as_ref() {
            Some(mixer) => mixer.render_frames(frames),
            None => vec![0.0; frames * self.channel_count as usize],
        }
    }

    /// How many times the output has been resumed from suspension.
    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::Relaxed)
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
        if self.suspended.swap(false, Ordering::Relaxed) {
            info!(output = self.name, "Mock output resumed.");
            self.resumes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn attach(&self, mixer: Arc<AudioMixer>) -> Result<(), OutputError> {
        *self.mixer.write() = Some(mixer);
        Ok(())
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Mock, Channels={}, {} Hz)",
            self.name, self.channel_count, self.sample_rate
        )
    }
}
