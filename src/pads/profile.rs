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
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{self, KeyValueStore, StoreError, ACTIVE_PROFILE_KEY, PROFILES_KEY};

const DEFAULT_PROFILE_ID: &str = "default-mpc";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("the last profile can't be deleted")]
    LastProfile,

    #[error("no profile with id {0}")]
    NotFound(String),

    #[error("no macro with id {0}")]
    MacroNotFound(u32),

    #[error("invalid MIDI channel {0}, channels are 0-15")]
    InvalidChannel(u8),

    #[error("invalid note {0}, notes are 0-127")]
    InvalidNote(u8),

    #[error("invalid control number {0}, control numbers are 0-127")]
    InvalidControl(u8),

    #[error("there must be at least one profile")]
    Empty,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A named control change exposed by a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroMapping {
    pub id: u32,
    pub label: String,
    #[serde(rename = "cc")]
    pub control_number: u8,
}

impl MacroMapping {
    pub fn new(id: u32, label: &str, control_number: u8) -> MacroMapping {
        MacroMapping {
            id,
            label: label.to_string(),
            control_number,
        }
    }
}

/// How a piece of hardware maps onto the pads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiProfile {
    pub id: String,
    pub name: String,
    /// 0-15.
    pub channel: u8,
    /// The note that plays pad 1.
    pub pad_base_note: u8,
    /// Whether pad presses should be echoed to outputs.
    pub sync_out: bool,
    pub macros: Vec<MacroMapping>,
}

impl MidiProfile {
    /// The built-in profile, used whenever no stored profile is active.
    pub fn default_hardware() -> MidiProfile {
        MidiProfile {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: "MPC Hardware Default".to_string(),
            channel: 0,
            pad_base_note: 36,
            sync_out: true,
            macros: vec![
                MacroMapping::new(1, "Filter", 74),
                MacroMapping::new(2, "Res", 71),
                MacroMapping::new(3, "Attack", 73),
                MacroMapping::new(4, "Decay", 72),
            ],
        }
    }

    /// A fresh user profile.
    pub fn custom(id: &str) -> MidiProfile {
        MidiProfile {
            id: id.to_string(),
            name: "New Custom Device".to_string(),
            channel: 0,
            pad_base_note: 36,
            sync_out: false,
            macros: (1..=4)
                .map(|n| MacroMapping::new(n, &format!("Macro {}", n), n as u8))
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.channel > 15 {
            return Err(ProfileError::InvalidChannel(self.channel));
        }
        if self.pad_base_note > 127 {
            return Err(ProfileError::InvalidNote(self.pad_base_note));
        }
        if let Some(mapping) = self.macros.iter().find(|m| m.control_number > 127) {
            return Err(ProfileError::InvalidControl(mapping.control_number));
        }
        Ok(())
    }

    pub fn find_macro(&self, id: u32) -> Option<&MacroMapping> {
        self.macros.iter().find(|mapping| mapping.id == id)
    }
}

/// A partial change to a profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub channel: Option<u8>,
    pub pad_base_note: Option<u8>,
    pub sync_out: Option<bool>,
    pub macros: Option<Vec<MacroMapping>>,
}

/// Every known profile and which one is active.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: Vec<MidiProfile>,
    active_id: String,
}

impl Default for ProfileSet {
    fn default() -> Self {
        ProfileSet {
            profiles: vec![MidiProfile::default_hardware()],
            active_id: DEFAULT_PROFILE_ID.to_string(),
        }
    }
}

/// The stored profile list. Missing or malformed lists become the built-in one.
#[derive(Deserialize)]
#[serde(transparent)]
struct StoredProfiles(Vec<MidiProfile>);

impl Default for StoredProfiles {
    fn default() -> Self {
        StoredProfiles(vec![MidiProfile::default_hardware()])
    }
}

impl ProfileSet {
    /// Creates a set from its parts. There must be at least one profile and every
    /// profile must be valid.
    pub fn new(profiles: Vec<MidiProfile>, active_id: &str) -> Result<ProfileSet, ProfileError> {
        if profiles.is_empty() {
            return Err(ProfileError::Empty);
        }
        for profile in &profiles {
            profile.validate()?;
        }
        Ok(ProfileSet {
            profiles,
            active_id: active_id.to_string(),
        })
    }

    /// Loads the profiles and the active id from the store.
    pub fn load(store: &dyn KeyValueStore) -> ProfileSet {
        let StoredProfiles(mut profiles) = store::load_or_default(store, PROFILES_KEY);
        if profiles.is_empty() {
            warn!("Stored profile list is empty, using the default.");
            profiles = StoredProfiles::default().0;
        } else if let Some(invalid) = profiles.iter().find_map(|profile| profile.validate().err()) {
            warn!(
                err = invalid.to_string(),
                "Stored profiles are invalid, using the default."
            );
            profiles = StoredProfiles::default().0;
        }

        let active_id: Option<String> = store::load_or_default(store, ACTIVE_PROFILE_KEY);
        ProfileSet {
            profiles,
            active_id: active_id.unwrap_or_else(|| DEFAULT_PROFILE_ID.to_string()),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store::save(store, PROFILES_KEY, &self.profiles)?;
        store::save(store, ACTIVE_PROFILE_KEY, &self.active_id)
    }

    pub fn profiles(&self) -> &[MidiProfile] {
        &self.profiles
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn get(&self, id: &str) -> Option<&MidiProfile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    /// The active profile. Falls back to the built-in profile if the active id
    /// doesn't match any stored profile.
    pub fn active(&self) -> MidiProfile {
        self.get(&self.active_id)
            .cloned()
            .unwrap_or_else(MidiProfile::default_hardware)
    }

    /// Adds a new custom profile and makes it active.
    pub fn create(&mut self) -> &MidiProfile {
        let mut id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        while self.get(&id.to_string()).is_some() {
            id += 1;
        }
        let id = id.to_string();

        info!(id, "Created profile.");
        self.profiles.push(MidiProfile::custom(&id));
        self.active_id = id;
        &self.profiles[self.profiles.len() - 1]
    }

    /// Applies a partial update. Nothing changes if the result would be invalid.
    pub fn update(&mut self, id: &str, update: ProfileUpdate) -> Result<(), ProfileError> {
        let profile = self
            .profiles
            .iter_mut()
            .find(|profile| profile.id == id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;

        let mut updated = profile.clone();
        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(channel) = update.channel {
            updated.channel = channel;
        }
        if let Some(pad_base_note) = update.pad_base_note {
            updated.pad_base_note = pad_base_note;
        }
        if let Some(sync_out) = update.sync_out {
            updated.sync_out = sync_out;
        }
        if let Some(macros) = update.macros {
            updated.macros = macros;
        }
        updated.validate()?;

        *profile = updated;
        Ok(())
    }

    /// Deletes a profile. The last remaining profile can't be deleted. Deleting the
    /// active profile activates the first remaining one.
    pub fn delete(&mut self, id: &str) -> Result<(), ProfileError> {
        if self.profiles.len() <= 1 {
            return Err(ProfileError::LastProfile);
        }
        let index = self
            .profiles
            .iter()
            .position(|profile| profile.id == id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;

        self.profiles.remove(index);
        if self.active_id == id {
            self.active_id = self.profiles[0].id.clone();
        }
        info!(id, active = self.active_id, "Deleted profile.");
        Ok(())
    }

    pub fn activate(&mut self, id: &str) -> Result<(), ProfileError> {
        if self.get(id).is_none() {
            return Err(ProfileError::NotFound(id.to_string()));
        }
        self.active_id = id.to_string();
        Ok(())
    }
}
