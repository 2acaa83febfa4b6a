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
//! Background loading of pad samples that aren't cached yet, so a slow fetch or
//! decode never holds up MIDI dispatch.

use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, span, warn, Level};

use super::PadIndex;
use crate::audio::SampleEngine;

/// A pad sample to load and then play.
pub(crate) struct PlayRequest {
    pub pad: PadIndex,
    pub sample_path: String,
    pub gain: f32,
    pub pitch: f64,
}

/// Loads and plays requested samples, one at a time, on a dedicated thread. The
/// thread exits once the loader is dropped and the queue is drained.
pub(crate) struct SampleLoader {
    tx: Sender<PlayRequest>,
}

impl SampleLoader {
    pub fn new(engine: Arc<SampleEngine>) -> SampleLoader {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Err(e) = thread::Builder::new()
            .name("pad-loader".to_string())
            .spawn(move || run(engine, rx))
        {
            error!(err = e.to_string(), "Unable to start the pad loader thread.");
        }
        SampleLoader { tx }
    }

    /// Queues the request. It plays as soon as its sample is decoded.
    pub fn play(&self, request: PlayRequest) {
        if self.tx.send(request).is_err() {
            error!("Pad loader is not running, dropping trigger.");
        }
    }
}

fn run(engine: Arc<SampleEngine>, rx: Receiver<PlayRequest>) {
    for request in rx.iter() {
        let span = span!(Level::DEBUG, "load pad", pad = request.pad.get());
        let _enter = span.enter();

        match engine.load_sample(&request.sample_path, &request.sample_path) {
            Ok(buffer) => engine.play_buffer(&buffer, request.gain, request.pitch),
            Err(e) => warn!(
                sample = request.sample_path,
                err = e.to_string(),
                "Unable to load pad sample."
            ),
        }
    }
    debug!("Pad loader stopped.");
}
