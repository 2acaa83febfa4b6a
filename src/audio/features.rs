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
use std::fmt;

use serde::Serialize;

use super::buffer::SampleBuffer;

/// Linear levels at or below zero are replaced with this before conversion to dB.
pub const LEVEL_FLOOR: f64 = 1e-6;

/// Summary statistics of a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    pub peak_db: f64,
    pub rms_db: f64,
    pub duration_seconds: f64,
    pub sample_rate_hz: u32,
}

impl fmt::Display for FeatureSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "peak {:.2} dB, rms {:.2} dB, {:.2}s at {} Hz",
            self.peak_db, self.rms_db, self.duration_seconds, self.sample_rate_hz
        )
    }
}

fn to_db(level: f64) -> f64 {
    // NaN (from an empty mean) also takes the floor.
    let level = if level > 0.0 { level } else { LEVEL_FLOOR };
    20.0 * level.log10()
}

/// Computes the peak and RMS levels of the first channel.
pub fn analyze_features(buffer: &SampleBuffer) -> FeatureSnapshot {
    let mut peak: f64 = 0.0;
    let mut sum_squares: f64 = 0.0;
    let mut count: usize = 0;
    for sample in buffer.channel(0) {
        let sample = sample as f64;
        peak = peak.max(sample.abs());
        sum_squares += sample * sample;
        count += 1;
    }
    let rms = (sum_squares / count as f64).sqrt();

    FeatureSnapshot {
        peak_db: to_db(peak),
        rms_db: to_db(rms),
        duration_seconds: buffer.duration().as_secs_f64(),
        sample_rate_hz: buffer.sample_rate(),
    }
}
