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

/// Errors produced while fetching or decoding a sample.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unable to fetch {0}: {1}")]
    Fetch(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio format error: {0}")]
    Format(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoTrack,

    #[error("Decoded audio contains no samples")]
    Empty,
}

/// Errors produced by an audio output.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("No audio output device found: {0}")]
    NoDevice(String),

    #[error("Audio output configuration error: {0}")]
    Config(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Audio output thread has stopped")]
    Closed,
}
