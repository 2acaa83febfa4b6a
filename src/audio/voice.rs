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
use std::sync::Arc;

use super::buffer::SampleBuffer;

/// A single playing instance of a buffer. Voices are independent; the same buffer
/// may be played by any number of them at once.
pub struct Voice {
    buffer: Arc<SampleBuffer>,
    /// Fractional read position, in source frames.
    position: f64,
    /// Source frames advanced per output frame.
    step: f64,
    gain: f32,
}

impl Voice {
    /// Creates a voice. The step compensates for any difference between the buffer's
    /// sample rate and the output's, then applies the pitch ratio.
    pub fn new(buffer: Arc<SampleBuffer>, gain: f32, pitch: f64, output_rate: u32) -> Voice {
        let rate_ratio = if output_rate == 0 || buffer.sample_rate() == 0 {
            1.0
        } else {
            buffer.sample_rate() as f64 / output_rate as f64
        };
        Voice {
            buffer,
            position: 0.0,
            step: pitch * rate_ratio,
            gain,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.buffer.frames() as f64
    }

    /// Adds the next frames of this voice into the interleaved output. Output channels
    /// beyond the buffer's channel count wrap around onto the buffer's channels.
    /// Returns false once the voice has played to the end.
    pub fn mix_into(&mut self, output: &mut [f32], output_channels: usize) -> bool {
        if output_channels == 0 {
            return false;
        }

        let source_channels = self.buffer.channel_count() as usize;
        let frames = self.buffer.frames();
        for frame in output.chunks_exact_mut(output_channels) {
            if self.is_finished() {
                return false;
            }

            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            for (channel, out) in frame.iter_mut().enumerate() {
                let source_channel = channel % source_channels;
                let current = self.buffer.sample(index, source_channel);
                let next = if index + 1 < frames {
                    self.buffer.sample(index + 1, source_channel)
                } else {
                    current
                };
                *out += (current + (next - current) * fraction) * self.gain;
            }
            self.position += self.step;
        }

        !self.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo() {
        let buffer = Arc::new(SampleBuffer::new(vec![1.0, 0.5], 1, 44100));
        let mut voice = Voice::new(buffer, 0.5, 1.0, 44100);

        let mut output = vec![0.0; 6];
        assert!(!voice.mix_into(&mut output, 2));
        assert_eq!(output, vec![0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_adds_into_existing_output() {
        let buffer = Arc::new(SampleBuffer::new(vec![0.25; 4], 1, 44100));
        let mut voice = Voice::new(buffer, 1.0, 1.0, 44100);

        let mut output = vec![0.5; 2];
        assert!(voice.mix_into(&mut output, 1));
        assert_eq!(output, vec![0.75, 0.75]);
    }

    #[test]
    fn test_pitch_and_rate_compensation() {
        let buffer = Arc::new(SampleBuffer::new(vec![0.0, 1.0, 2.0, 3.0], 1, 44100));

        // An octave up skips every other frame.
        let mut voice = Voice::new(buffer.clone(), 1.0, 2.0, 44100);
        let mut output = vec![0.0; 2];
        voice.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.0, 2.0]);
        assert!(voice.is_finished());

        // A 22.05kHz buffer on a 44.1kHz output is interpolated at half speed.
        let slow = Arc::new(SampleBuffer::new(vec![0.0, 1.0, 2.0, 3.0], 1, 22050));
        let mut voice = Voice::new(slow, 1.0, 1.0, 44100);
        let mut output = vec![0.0; 3];
        voice.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.0, 0.5, 1.0]);
    }
}
