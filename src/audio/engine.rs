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
use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, span, warn, Level};

use super::{
    analyser::Analyser,
    buffer::SampleBuffer,
    decode,
    error::{DecodeError, OutputError},
    features::{self, FeatureSnapshot},
    fetch::{self, Fetcher},
    mixer::AudioMixer,
    voice::Voice,
    Output,
};

/// Decodes, caches and plays samples through a single output, and exposes live
/// taps on the mixed signal.
pub struct SampleEngine {
    output: Arc<dyn Output>,
    fetcher: Arc<dyn Fetcher>,
    mixer: Arc<AudioMixer>,
    analyser: Arc<Mutex<Analyser>>,
    /// Decoded buffers by sample id. Entries are never evicted.
    cache: RwLock<HashMap<String, Arc<SampleBuffer>>>,
}

impl SampleEngine {
    /// Creates an engine and attaches its mixer to the output.
    pub fn new(
        output: Arc<dyn Output>,
        fetcher: Arc<dyn Fetcher>,
        fft_size: usize,
        smoothing: f32,
    ) -> Result<SampleEngine, OutputError> {
        let analyser = Arc::new(Mutex::new(Analyser::new(fft_size, smoothing)));
        let mixer = Arc::new(AudioMixer::new(
            output.channel_count(),
            output.sample_rate(),
            analyser.clone(),
        ));
        output.attach(mixer.clone())?;

        Ok(SampleEngine {
            output,
            fetcher,
            mixer,
            analyser,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Fetches and decodes a sample, caching it under the given id. Later calls with
    /// the same id return the cached buffer without fetching again. Failures are
    /// not cached.
    pub fn load_sample(
        &self,
        source: &str,
        sample_id: &str,
    ) -> Result<Arc<SampleBuffer>, DecodeError> {
        if let Some(buffer) = self.cached(sample_id) {
            return Ok(buffer);
        }

        let span = span!(Level::INFO, "load sample");
        let _enter = span.enter();

        let bytes = self.fetcher.fetch(source)?;
        let extension = fetch::extension(source);
        let buffer = Arc::new(decode::decode(bytes, extension.as_deref())?);

        info!(
            sample = sample_id,
            frames = buffer.frames(),
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            "Loaded sample."
        );

        // Two loads racing on the same id keep whichever finished first.
        Ok(self
            .cache
            .write()
            .entry(sample_id.to_string())
            .or_insert(buffer)
            .clone())
    }

    /// The cached buffer for the given id, if loaded.
    pub fn cached(&self, sample_id: &str) -> Option<Arc<SampleBuffer>> {
        self.cache.read().get(sample_id).cloned()
    }

    /// Starts a new voice for the buffer. Velocity is the gain, clamped to 0..=1.
    /// Pitch scales the playback rate; anything but a positive finite ratio plays
    /// at the original pitch. A suspended output is resumed first.
    pub fn play_buffer(&self, buffer: &Arc<SampleBuffer>, velocity: f32, pitch: f64) {
        if self.output.is_suspended() {
            if let Err(e) = self.output.resume() {
                warn!(err = e.to_string(), "Unable to resume audio output.");
            }
        }

        let gain = if velocity.is_nan() {
            0.0
        } else {
            velocity.clamp(0.0, 1.0)
        };
        let pitch = if pitch.is_finite() && pitch > 0.0 {
            pitch
        } else {
            warn!(pitch, "Invalid pitch, playing unpitched.");
            1.0
        };

        debug!(gain, pitch, frames = buffer.frames(), "Starting voice.");
        self.mixer.add_voice(Voice::new(
            buffer.clone(),
            gain,
            pitch,
            self.output.sample_rate(),
        ));
    }

    /// The current byte spectrum of the mixed output.
    pub fn frequency_data(&self) -> Vec<u8> {
        self.analyser.lock().frequency_data()
    }

    /// The most recent mixed mono samples, oldest first.
    pub fn waveform_data(&self) -> Vec<f32> {
        self.analyser.lock().waveform_data()
    }

    pub fn fft_size(&self) -> usize {
        self.analyser.lock().fft_size()
    }

    pub fn analyze_features(&self, buffer: &SampleBuffer) -> FeatureSnapshot {
        features::analyze_features(buffer)
    }

    pub fn active_voices(&self) -> usize {
        self.mixer.active_voice_count()
    }
}

impl fmt::Debug for SampleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleEngine")
            .field("output", &self.output.to_string())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil::{wav_bytes, MemoryFetcher};

    fn engine() -> (SampleEngine, Arc<mock::Output>, Arc<MemoryFetcher>) {
        let output = Arc::new(mock::Output::with_format("mock", 1, 44100));
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("kick.wav", wav_bytes(&[vec![1.0, 0.5, 0.25, 0.0]], 44100));
        fetcher.insert("broken.wav", b"not a wav".to_vec());
        let engine = SampleEngine::new(output.clone(), fetcher.clone(), 32, 0.8).unwrap();
        (engine, output, fetcher)
    }

    #[test]
    fn test_load_is_cached() {
        let (engine, _, fetcher) = engine();
        let first = engine.load_sample("kick.wav", "kick").unwrap();
        let second = engine.load_sample("kick.wav", "kick").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.fetch_count("kick.wav"), 1);
        assert!(engine.cached("kick").is_some());
        assert!(engine.cached("snare").is_none());
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (engine, _, fetcher) = engine();
        assert!(engine.load_sample("broken.wav", "broken").is_err());
        assert!(engine.load_sample("broken.wav", "broken").is_err());
        assert_eq!(fetcher.fetch_count("broken.wav"), 2);
        assert!(engine.cached("broken").is_none());

        assert!(matches!(
            engine.load_sample("missing.wav", "missing"),
            Err(DecodeError::Fetch(_, _))
        ));
    }

    #[test]
    fn test_play_resumes_and_mixes() {
        let (engine, output, _) = engine();
        let buffer = engine.load_sample("kick.wav", "kick").unwrap();
        assert!(crate::audio::Output::is_suspended(output.as_ref()));

        engine.play_buffer(&buffer, 0.5, 1.0);
        assert!(!crate::audio::Output::is_suspended(output.as_ref()));
        assert_eq!(output.resume_count(), 1);

        assert_eq!(output.render(4), vec![0.5, 0.25, 0.125, 0.0]);

        // Already running, no second resume.
        engine.play_buffer(&buffer, 1.0, 1.0);
        assert_eq!(output.resume_count(), 1);
    }

    #[test]
    fn test_polyphony_and_clamping() {
        let (engine, output, _) = engine();
        let buffer = engine.load_sample("kick.wav", "kick").unwrap();

        engine.play_buffer(&buffer, 2.0, 1.0);
        engine.play_buffer(&buffer, -1.0, 1.0);
        engine.play_buffer(&buffer, 1.0, f64::NAN);
        assert_eq!(engine.active_voices(), 3);

        // Gains of 1.0, 0.0 and 1.0, all at the original pitch.
        assert_eq!(output.render(2), vec![2.0, 1.0]);
        output.render(4);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_taps_follow_the_mix() {
        let (engine, output, _) = engine();
        assert_eq!(engine.frequency_data().len(), 16);
        assert_eq!(engine.waveform_data().len(), 32);

        let buffer = engine.load_sample("kick.wav", "kick").unwrap();
        engine.play_buffer(&buffer, 1.0, 1.0);
        output.render(4);

        let waveform = engine.waveform_data();
        assert_eq!(&waveform[28..], &[1.0, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_analyze_features() {
        let (engine, _, _) = engine();
        let buffer = engine.load_sample("kick.wav", "kick").unwrap();
        let snapshot = engine.analyze_features(&buffer);
        assert!(snapshot.peak_db.abs() < 1e-9);
        assert_eq!(snapshot.sample_rate_hz, 44100);
    }
}
