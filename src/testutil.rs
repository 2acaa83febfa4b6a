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
    collections::HashMap,
    io::Cursor,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::audio::{DecodeError, Fetcher};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Encodes the given channels as a 32-bit float WAV file in memory. All channels
/// must be the same length.
pub fn wav_bytes(channels: &[Vec<f32>], sample_rate: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("unable to create WAV writer");
        let frames = channels.first().map(Vec::len).unwrap_or(0);
        for frame in 0..frames {
            for channel in channels {
                writer
                    .write_sample(channel[frame])
                    .expect("unable to write sample");
            }
        }
        writer.finalize().expect("unable to finalize WAV");
    }
    cursor.into_inner()
}

/// A fetcher serving sources from memory and counting fetches per source. Sources
/// can be slowed down to stand in for a slow network.
#[derive(Default)]
pub struct MemoryFetcher {
    sources: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<HashMap<String, usize>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl MemoryFetcher {
    pub fn new() -> MemoryFetcher {
        MemoryFetcher::default()
    }

    pub fn insert(&self, source: &str, bytes: Vec<u8>) {
        self.sources.lock().insert(source.to_string(), bytes);
    }

    /// Makes every fetch of the source take at least the given time.
    pub fn delay(&self, source: &str, delay: Duration) {
        self.delays.lock().insert(source.to_string(), delay);
    }

    pub fn fetch_count(&self, source: &str) -> usize {
        self.fetches.lock().get(source).copied().unwrap_or(0)
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DecodeError> {
        *self.fetches.lock().entry(source.to_string()).or_insert(0) += 1;
        let delay = self.delays.lock().get(source).copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        self.sources
            .lock()
            .get(source)
            .cloned()
            .ok_or_else(|| DecodeError::Fetch(source.to_string(), "not found".to_string()))
    }
}
