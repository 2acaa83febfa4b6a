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
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use super::engine::SampleEngine;
use crate::playsync::CancelHandle;

/// One reading of the engine's live taps.
#[derive(Debug, Clone)]
pub struct TapFrame {
    pub frequency: Vec<u8>,
    pub waveform: Vec<f32>,
}

/// Reads the engine's taps once per interval on a background thread until
/// cancelled. Dropping the loop cancels it.
pub struct PollLoop {
    cancel_handle: CancelHandle,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl PollLoop {
    pub fn start<F>(engine: Arc<SampleEngine>, interval: Duration, mut callback: F) -> PollLoop
    where
        F: FnMut(&TapFrame) + Send + 'static,
    {
        let cancel_handle = CancelHandle::new();
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::Builder::new()
                .name("tap-poll".to_string())
                .spawn(move || {
                    debug!(interval = ?interval, "Tap polling started.");
                    loop {
                        let started = Instant::now();
                        let frame = TapFrame {
                            frequency: engine.frequency_data(),
                            waveform: engine.waveform_data(),
                        };
                        callback(&frame);

                        let remaining = interval.saturating_sub(started.elapsed());
                        if cancel_handle.is_cancelled() || cancel_handle.wait_timeout(remaining)
                        {
                            break;
                        }
                    }
                    debug!("Tap polling stopped.");
                })
        };

        let join_handle = match join_handle {
            Ok(join_handle) => Some(join_handle),
            Err(e) => {
                error!(err = e.to_string(), "Unable to start tap polling.");
                None
            }
        };

        PollLoop {
            cancel_handle,
            join_handle,
        }
    }

    /// Stops polling and waits for the current callback to finish.
    pub fn cancel(&mut self) {
        self.cancel_handle.cancel();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Tap polling thread panicked.");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.is_some() && !self.cancel_handle.is_cancelled()
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::audio::mock;
    use crate::testutil::{eventually, MemoryFetcher};

    #[test]
    fn test_polls_until_cancelled() {
        let output = Arc::new(mock::Output::get("mock"));
        let engine = Arc::new(
            SampleEngine::new(output, Arc::new(MemoryFetcher::new()), 64, 0.8).unwrap(),
        );

        let frames = Arc::new(AtomicUsize::new(0));
        let mut poll = {
            let frames = frames.clone();
            PollLoop::start(engine, Duration::from_millis(5), move |frame| {
                assert_eq!(frame.frequency.len(), 32);
                assert_eq!(frame.waveform.len(), 64);
                frames.fetch_add(1, Ordering::Relaxed);
            })
        };
        assert!(poll.is_running());

        eventually(|| frames.load(Ordering::Relaxed) >= 3, "Taps were never polled");
        poll.cancel();
        assert!(!poll.is_running());

        let stopped_at = frames.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(frames.load(Ordering::Relaxed), stopped_at);
    }

    #[test]
    fn test_drop_stops_polling() {
        let output = Arc::new(mock::Output::get("mock"));
        let engine = Arc::new(
            SampleEngine::new(output, Arc::new(MemoryFetcher::new()), 32, 0.8).unwrap(),
        );

        let frames = Arc::new(AtomicUsize::new(0));
        {
            let counter = frames.clone();
            let _poll = PollLoop::start(engine, Duration::from_millis(5), move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
            eventually(|| frames.load(Ordering::Relaxed) >= 1, "Taps were never polled");
        }

        let stopped_at = frames.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(frames.load(Ordering::Relaxed), stopped_at);
    }
}
