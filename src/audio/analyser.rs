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

//! Live taps on the mixed output: a rolling waveform and a smoothed byte spectrum.

use std::{f32::consts::PI, sync::Arc};

use realfft::{num_complex::Complex, RealFftPlanner, RealToComplex};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// The decibel value mapped to byte 0.
const MIN_DECIBELS: f32 = -100.0;
/// The decibel value mapped to byte 255.
const MAX_DECIBELS: f32 = -30.0;

pub struct Analyser {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    /// The most recent samples, oldest at write_pos.
    ring: Vec<f32>,
    write_pos: usize,
    windowed: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
}

impl Analyser {
    /// Creates an analyser. The FFT size is rounded up to a power of two within
    /// 32..=32768 and smoothing is clamped to 0..=1.
    pub fn new(fft_size: usize, smoothing: f32) -> Analyser {
        let fft_size = fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let spectrum = fft.make_output_vec();

        // Blackman window.
        let window = (0..fft_size)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / fft_size as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Analyser {
            fft,
            window,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            windowed: vec![0.0; fft_size],
            spectrum,
            smoothed: vec![0.0; fft_size / 2],
            smoothing: if smoothing.is_finite() {
                smoothing.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    pub fn fft_size(&self) -> usize {
        self.ring.len()
    }

    /// Appends mono samples.
    pub fn push(&mut self, samples: &[f32]) {
        let size = self.ring.len();
        for &sample in samples {
            self.ring[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    /// The most recent fft_size samples, oldest first.
    pub fn waveform_data(&self) -> Vec<f32> {
        let mut waveform = Vec::with_capacity(self.ring.len());
        waveform.extend_from_slice(&self.ring[self.write_pos..]);
        waveform.extend_from_slice(&self.ring[..self.write_pos]);
        waveform
    }

    /// Computes the spectrum of the current window as fft_size/2 bytes. Each call
    /// folds the new magnitudes into the smoothed spectrum.
    pub fn frequency_data(&mut self) -> Vec<u8> {
        let size = self.ring.len();
        let oldest_first = self.ring[self.write_pos..]
            .iter()
            .chain(&self.ring[..self.write_pos]);
        for ((windowed, sample), weight) in self
            .windowed
            .iter_mut()
            .zip(oldest_first)
            .zip(&self.window)
        {
            *windowed = sample * weight;
        }

        if self
            .fft
            .process(&mut self.windowed, &mut self.spectrum)
            .is_err()
        {
            return vec![0; size / 2];
        }

        let scale = 255.0 / (MAX_DECIBELS - MIN_DECIBELS);
        self.smoothed
            .iter_mut()
            .zip(&self.spectrum)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() / size as f32;
                *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
                let decibels = 20.0 * smoothed.log10();
                (scale * (decibels - MIN_DECIBELS)).clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence() {
        let mut analyser = Analyser::new(2048, 0.8);
        assert_eq!(analyser.fft_size(), 2048);

        let spectrum = analyser.frequency_data();
        assert_eq!(spectrum.len(), 1024);
        assert!(spectrum.iter().all(|&bin| bin == 0));
        assert!(analyser.waveform_data().iter().all(|&sample| sample == 0.0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let size = 2048;
        let mut analyser = Analyser::new(size, 0.8);
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * 64.0 * i as f32 / size as f32).sin())
            .collect();
        analyser.push(&samples);

        let spectrum = analyser.frequency_data();
        let mut peak = 0;
        for (bin, &value) in spectrum.iter().enumerate() {
            if value > spectrum[peak] {
                peak = bin;
            }
        }
        assert_eq!(peak, 64);
        assert_eq!(spectrum[64], 255);
        assert!(spectrum[400] < spectrum[64]);
    }

    #[test]
    fn test_waveform_is_chronological() {
        let mut analyser = Analyser::new(32, 0.8);
        let samples: Vec<f32> = (0..40).map(|i| i as f32).collect();
        analyser.push(&samples);

        let expected: Vec<f32> = (8..40).map(|i| i as f32).collect();
        assert_eq!(analyser.waveform_data(), expected);
    }

    #[test]
    fn test_fft_size_is_normalized() {
        assert_eq!(Analyser::new(1000, 0.8).fft_size(), 1024);
        assert_eq!(Analyser::new(4, 0.8).fft_size(), 32);
        assert_eq!(Analyser::new(1 << 20, 0.8).fft_size(), 32768);
    }
}
