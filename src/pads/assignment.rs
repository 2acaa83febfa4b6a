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
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{InvalidPad, PadIndex};

/// What a pad plays. Fields missing from stored data take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PadAssignment {
    /// The sample reference. Empty means the pad is unassigned.
    pub sample_path: String,
    /// Trim start, as a percentage of the sample.
    #[serde(rename = "start")]
    pub trim_start: f64,
    /// Trim end, as a percentage of the sample.
    #[serde(rename = "end")]
    pub trim_end: f64,
    #[serde(rename = "loop")]
    pub loop_enabled: bool,
    /// Semitones.
    pub tune_coarse: i32,
    /// Cents.
    pub tune_fine: i32,
    pub mute_group: String,
}

impl Default for PadAssignment {
    fn default() -> Self {
        PadAssignment {
            sample_path: String::new(),
            trim_start: 0.0,
            trim_end: 100.0,
            loop_enabled: false,
            tune_coarse: 0,
            tune_fine: 0,
            mute_group: "None".to_string(),
        }
    }
}

impl PadAssignment {
    /// A default assignment playing the given sample.
    pub fn with_sample(sample_path: &str) -> PadAssignment {
        PadAssignment {
            sample_path: sample_path.to_string(),
            ..Default::default()
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.sample_path.is_empty()
    }

    /// The playback rate ratio for the pad's tuning.
    pub fn pitch(&self) -> f64 {
        let semitones = self.tune_coarse as f64 + self.tune_fine as f64 / 100.0;
        2f64.powf(semitones / 12.0)
    }
}

/// A partial change to a pad assignment.
#[derive(Debug, Clone, Default)]
pub struct PadUpdate {
    pub sample_path: Option<String>,
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
    pub loop_enabled: Option<bool>,
    pub tune_coarse: Option<i32>,
    pub tune_fine: Option<i32>,
    pub mute_group: Option<String>,
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

impl PadUpdate {
    fn apply(self, assignment: &mut PadAssignment) {
        if let Some(sample_path) = self.sample_path {
            assignment.sample_path = sample_path;
        }
        if let Some(trim_start) = self.trim_start {
            assignment.trim_start = clamp_percent(trim_start);
        }
        if let Some(trim_end) = self.trim_end {
            assignment.trim_end = clamp_percent(trim_end);
        }
        if let Some(loop_enabled) = self.loop_enabled {
            assignment.loop_enabled = loop_enabled;
        }
        if let Some(tune_coarse) = self.tune_coarse {
            assignment.tune_coarse = tune_coarse;
        }
        if let Some(tune_fine) = self.tune_fine {
            assignment.tune_fine = tune_fine;
        }
        if let Some(mute_group) = self.mute_group {
            assignment.mute_group = mute_group;
        }
    }
}

/// The assignments of a 16-pad bank. Stored as an object keyed by pad number; a
/// key outside 1-16 makes the whole stored bank invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, PadAssignment>",
    into = "BTreeMap<String, PadAssignment>"
)]
pub struct PadBank {
    pads: BTreeMap<PadIndex, PadAssignment>,
}

impl Default for PadBank {
    fn default() -> Self {
        let mut bank = PadBank::empty();
        bank.assign(PadIndex(1), "Kick_808.wav");
        bank.assign(PadIndex(5), "Snare_Trap.wav");
        bank
    }
}

impl TryFrom<BTreeMap<String, PadAssignment>> for PadBank {
    type Error = InvalidPad;

    fn try_from(stored: BTreeMap<String, PadAssignment>) -> Result<Self, Self::Error> {
        let pads = stored
            .into_iter()
            .map(|(key, assignment)| Ok((key.parse::<PadIndex>()?, assignment)))
            .collect::<Result<BTreeMap<PadIndex, PadAssignment>, InvalidPad>>()?;
        Ok(PadBank { pads })
    }
}

impl From<PadBank> for BTreeMap<String, PadAssignment> {
    fn from(bank: PadBank) -> Self {
        bank.pads
            .into_iter()
            .map(|(pad, assignment)| (pad.to_string(), assignment))
            .collect()
    }
}

impl PadBank {
    /// A bank with no pads assigned.
    pub fn empty() -> PadBank {
        PadBank {
            pads: BTreeMap::new(),
        }
    }

    /// The assignment of the pad, or the default assignment if it has none.
    pub fn get(&self, pad: PadIndex) -> PadAssignment {
        self.pads.get(&pad).cloned().unwrap_or_default()
    }

    /// Points the pad at a sample, keeping the rest of its settings.
    pub fn assign(&mut self, pad: PadIndex, sample_path: &str) {
        self.update(
            pad,
            PadUpdate {
                sample_path: Some(sample_path.to_string()),
                ..Default::default()
            },
        );
    }

    /// Applies a partial update on top of the pad's current (or default) assignment.
    pub fn update(&mut self, pad: PadIndex, update: PadUpdate) {
        update.apply(self.pads.entry(pad).or_default());
    }

    /// Removes the pad's assignment. Returns what it was.
    pub fn clear(&mut self, pad: PadIndex) -> Option<PadAssignment> {
        self.pads.remove(&pad)
    }

    /// Every pad with a sample, in pad order.
    pub fn assigned(&self) -> impl Iterator<Item = (PadIndex, &PadAssignment)> {
        self.pads
            .iter()
            .filter(|(_, assignment)| assignment.is_assigned())
            .map(|(pad, assignment)| (*pad, assignment))
    }

    /// The sample of every assigned pad, in pad order.
    pub fn sample_paths(&self) -> Vec<String> {
        self.assigned()
            .map(|(_, assignment)| assignment.sample_path.clone())
            .collect()
    }

    /// Replaces the whole bank with default assignments for the given samples.
    pub fn apply_layout<I>(&mut self, layout: I)
    where
        I: IntoIterator<Item = (PadIndex, String)>,
    {
        self.pads = layout
            .into_iter()
            .map(|(pad, sample_path)| (pad, PadAssignment::with_sample(&sample_path)))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, KeyValueStore, MemoryStore, PAD_ASSIGNMENTS_KEY};

    fn pad(index: u8) -> PadIndex {
        PadIndex::new(index).unwrap()
    }

    #[test]
    fn test_default_bank() {
        let bank = PadBank::default();
        assert_eq!(bank.get(pad(1)).sample_path, "Kick_808.wav");
        assert_eq!(bank.get(pad(5)).sample_path, "Snare_Trap.wav");
        assert!(!bank.get(pad(2)).is_assigned());
        assert_eq!(bank.sample_paths(), vec!["Kick_808.wav", "Snare_Trap.wav"]);

        let default = bank.get(pad(16));
        assert_eq!(default.trim_start, 0.0);
        assert_eq!(default.trim_end, 100.0);
        assert!(!default.loop_enabled);
        assert_eq!(default.mute_group, "None");
    }

    #[test]
    fn test_update_merges() {
        let mut bank = PadBank::empty();
        bank.update(
            pad(3),
            PadUpdate {
                trim_end: Some(150.0),
                tune_coarse: Some(-12),
                ..Default::default()
            },
        );
        bank.assign(pad(3), "Hat.wav");

        let assignment = bank.get(pad(3));
        assert_eq!(assignment.sample_path, "Hat.wav");
        assert_eq!(assignment.trim_end, 100.0);
        assert_eq!(assignment.tune_coarse, -12);
        assert_eq!(assignment.pitch(), 0.5);

        assert!(bank.clear(pad(3)).is_some());
        assert!(bank.is_empty());
    }

    #[test]
    fn test_pitch() {
        let mut assignment = PadAssignment::with_sample("a.wav");
        assert_eq!(assignment.pitch(), 1.0);
        assignment.tune_coarse = 12;
        assert_eq!(assignment.pitch(), 2.0);
        assignment.tune_coarse = 0;
        assignment.tune_fine = 50;
        assert!((assignment.pitch() - 2f64.powf(0.5 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn test_apply_layout_replaces() {
        let mut bank = PadBank::default();
        bank.apply_layout(vec![(pad(2), "Kick_808.wav".to_string())]);

        assert_eq!(bank.len(), 1);
        assert_eq!(bank.get(pad(2)), PadAssignment::with_sample("Kick_808.wav"));
        assert!(!bank.get(pad(1)).is_assigned());
    }

    #[test]
    fn test_stored_format() {
        let json = serde_json::to_value(PadBank::default()).unwrap();
        assert_eq!(json["1"]["samplePath"], "Kick_808.wav");
        assert_eq!(json["1"]["start"], 0.0);
        assert_eq!(json["1"]["end"], 100.0);
        assert_eq!(json["1"]["loop"], false);
        assert_eq!(json["5"]["muteGroup"], "None");
    }

    #[test]
    fn test_persistence() {
        let store = MemoryStore::new();
        let mut bank = PadBank::default();
        bank.update(
            pad(9),
            PadUpdate {
                sample_path: Some("Vox.wav".to_string()),
                loop_enabled: Some(true),
                ..Default::default()
            },
        );
        store::save(&store, PAD_ASSIGNMENTS_KEY, &bank).unwrap();
        let loaded: PadBank = store::load_or_default(&store, PAD_ASSIGNMENTS_KEY);
        assert_eq!(loaded, bank);

        // Partial records take defaults for the missing fields.
        store
            .set(PAD_ASSIGNMENTS_KEY, r#"{"2": {"samplePath": "Clap.wav"}}"#.to_string())
            .unwrap();
        let loaded: PadBank = store::load_or_default(&store, PAD_ASSIGNMENTS_KEY);
        assert_eq!(loaded.get(pad(2)), PadAssignment::with_sample("Clap.wav"));

        // Anything malformed falls back to the default bank as a whole.
        for corrupt in [
            "not json",
            r#"{"17": {"samplePath": "Clap.wav"}}"#,
            r#"{"2": {"samplePath": 5}}"#,
            r#"[1, 2]"#,
        ] {
            store.set(PAD_ASSIGNMENTS_KEY, corrupt.to_string()).unwrap();
            let loaded: PadBank = store::load_or_default(&store, PAD_ASSIGNMENTS_KEY);
            assert_eq!(loaded, PadBank::default());
        }
    }
}
