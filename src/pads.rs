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

//! The pad grid: profiles, pad assignments and the trigger controller tying the
//! device hub to the sample engine.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

mod assignment;
mod controller;
mod loader;
mod profile;

pub use assignment::{PadAssignment, PadBank, PadUpdate};
pub use controller::{export_config, PadController, PadSettings};
pub use profile::{MacroMapping, MidiProfile, ProfileError, ProfileSet, ProfileUpdate};

/// The number of pads in a bank.
pub const PAD_COUNT: u8 = 16;

#[derive(Debug, thiserror::Error)]
#[error("invalid pad {0}, pads are numbered 1-16")]
pub struct InvalidPad(pub String);

/// A pad number, always within 1-16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PadIndex(u8);

impl PadIndex {
    pub fn new(index: u8) -> Option<PadIndex> {
        (1..=PAD_COUNT).contains(&index).then_some(PadIndex(index))
    }

    /// Maps a note to a pad relative to the base note, which plays pad 1. Notes
    /// outside the 16 pads map to nothing; there is no wrapping or clamping.
    pub fn from_note(note: u8, base_note: u8) -> Option<PadIndex> {
        let pad = note as i16 - base_note as i16 + 1;
        u8::try_from(pad).ok().and_then(PadIndex::new)
    }

    /// The note that plays this pad, if it fits in the MIDI note range.
    pub fn note(self, base_note: u8) -> Option<u8> {
        let note = base_note as u16 + self.0 as u16 - 1;
        u8::try_from(note).ok().filter(|note| *note <= 127)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every pad, in order.
    pub fn all() -> impl Iterator<Item = PadIndex> {
        (1..=PAD_COUNT).map(PadIndex)
    }
}

impl TryFrom<u8> for PadIndex {
    type Error = InvalidPad;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        PadIndex::new(index).ok_or_else(|| InvalidPad(index.to_string()))
    }
}

impl From<PadIndex> for u8 {
    fn from(pad: PadIndex) -> u8 {
        pad.0
    }
}

impl FromStr for PadIndex {
    type Err = InvalidPad;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(PadIndex::new)
            .ok_or_else(|| InvalidPad(s.to_string()))
    }
}

impl fmt::Display for PadIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
