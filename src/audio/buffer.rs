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

/// Decoded PCM audio. Immutable once decoded and shared by every voice playing it.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Interleaved samples.
    data: Vec<f32>,
    channel_count: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a buffer from interleaved samples. A channel count of zero is treated as mono.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> SampleBuffer {
        SampleBuffer {
            data,
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames, i.e. samples per channel.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// The raw interleaved samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The sample at the given frame and channel, or silence past the end.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data
            .get(frame * self.channel_count as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }

    /// Iterates over a single channel.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channel_count as usize)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_channels() {
        let buffer = SampleBuffer::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 48000);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0).collect::<Vec<_>>(), vec![0.1, 0.3, 0.5]);
        assert_eq!(buffer.channel(1).collect::<Vec<_>>(), vec![0.2, 0.4, 0.6]);
        assert_eq!(buffer.sample(1, 1), 0.4);
        assert_eq!(buffer.sample(3, 0), 0.0);
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 44100], 1, 44100);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(SampleBuffer::new(vec![], 0, 0).duration(), Duration::ZERO);
    }
}
