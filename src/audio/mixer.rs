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
// Core voice mixing logic shared by the cpal and mock outputs.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::{analyser::Analyser, voice::Voice};

/// Mixes every active voice into the output and feeds the mix to the analyser.
pub struct AudioMixer {
    /// New voices waiting to be picked up by the audio thread.
    voice_tx: Sender<Voice>,
    voice_rx: Receiver<Voice>,
    state: Mutex<MixState>,
    analyser: Arc<Mutex<Analyser>>,
    active_voices: AtomicUsize,
    channel_count: u16,
    sample_rate: u32,
}

struct MixState {
    voices: Vec<Voice>,
    /// Scratch space for the mono downmix sent to the analyser.
    mono: Vec<f32>,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(channel_count: u16, sample_rate: u32, analyser: Arc<Mutex<Analyser>>) -> Self {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        Self {
            voice_tx,
            voice_rx,
            state: Mutex::new(MixState {
                voices: Vec::new(),
                mono: Vec::new(),
            }),
            analyser,
            active_voices: AtomicUsize::new(0),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Queues a voice. It starts at the beginning of the next rendered block.
    pub fn add_voice(&self, voice: Voice) {
        // The receiver lives as long as self, so this can't fail.
        let _ = self.voice_tx.send(voice);
    }

    /// Renders the next block of interleaved output, overwriting the given buffer.
    pub fn render(&self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.channel_count as usize;

        let mut state = self.state.lock();
        let MixState { voices, mono } = &mut *state;
        voices.extend(self.voice_rx.try_iter());
        voices.retain_mut(|voice| voice.mix_into(output, channels));
        self.active_voices.store(voices.len(), Ordering::Relaxed);

        mono.clear();
        mono.extend(
            output
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );

        // Never wait on a reader from the audio thread; a skipped block only costs
        // the taps a little freshness.
        if let Some(mut analyser) = self.analyser.try_lock() {
            analyser.push(mono);
        }
    }

    /// Renders the given number of frames into a new buffer.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * self.channel_count as usize];
        self.render(&mut output);
        output
    }

    /// Voices that are playing or waiting to start.
    pub fn active_voice_count(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed) + self.voice_rx.len()
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
