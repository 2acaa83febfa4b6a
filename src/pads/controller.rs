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
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    assignment::PadBank,
    loader::{PlayRequest, SampleLoader},
    profile::{MidiProfile, ProfileError, ProfileSet},
    PadIndex,
};
use crate::{
    audio::SampleEngine,
    midi::{
        DeviceHub, MidiEvent, Note, Subscription, DEFAULT_NOTE_DURATION, DEFAULT_NOTE_VELOCITY,
    },
    store::{self, KeyValueStore, StoreError, PAD_ASSIGNMENTS_KEY},
};

/// Timing and velocity used by the controller.
#[derive(Debug, Clone)]
pub struct PadSettings {
    /// Velocity of manual pad presses and the note they echo.
    pub note_velocity: u8,
    /// How long an echoed note sounds before its note-off.
    pub note_duration: Duration,
    /// How long a pad stays lit after a trigger.
    pub flash_duration: Duration,
}

impl Default for PadSettings {
    fn default() -> Self {
        PadSettings {
            note_velocity: DEFAULT_NOTE_VELOCITY,
            note_duration: DEFAULT_NOTE_DURATION,
            flash_duration: Duration::from_millis(100),
        }
    }
}

#[derive(Serialize)]
struct ExportedConfig<'a> {
    profile: &'a MidiProfile,
    pads: &'a PadBank,
}

/// Maps incoming notes to pads and plays what they're assigned.
pub struct PadController {
    hub: Arc<DeviceHub>,
    engine: Arc<SampleEngine>,
    loader: SampleLoader,
    store: Arc<dyn KeyValueStore>,
    settings: PadSettings,
    profiles: RwLock<ProfileSet>,
    pads: RwLock<PadBank>,
    /// When each lit pad goes dark.
    flashes: Mutex<HashMap<PadIndex, Instant>>,
    selected: Mutex<Option<PadIndex>>,
    subscription: Mutex<Option<Subscription>>,
}

impl PadController {
    /// Creates a controller with the profiles and pads held in the store. The hub's
    /// default channel follows the active profile from here on.
    pub fn new(
        hub: Arc<DeviceHub>,
        engine: Arc<SampleEngine>,
        store: Arc<dyn KeyValueStore>,
        settings: PadSettings,
    ) -> Arc<PadController> {
        let profiles = ProfileSet::load(store.as_ref());
        let pads: PadBank = store::load_or_default(store.as_ref(), PAD_ASSIGNMENTS_KEY);
        hub.set_default_channel(profiles.active().channel);

        Arc::new(PadController {
            hub,
            loader: SampleLoader::new(engine.clone()),
            engine,
            store,
            settings,
            profiles: RwLock::new(profiles),
            pads: RwLock::new(pads),
            flashes: Mutex::new(HashMap::new()),
            selected: Mutex::new(None),
            subscription: Mutex::new(None),
        })
    }

    /// Starts listening to the hub. Attaching twice replaces the first listener.
    pub fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let subscription = self.hub.on_message(move |event| {
            if let Some(controller) = weak.upgrade() {
                controller.handle_event(event);
            }
        });
        *self.subscription.lock() = Some(subscription);
        info!("Pad controller attached.");
    }

    /// Stops listening to the hub.
    pub fn detach(&self) {
        if self.subscription.lock().take().is_some() {
            info!("Pad controller detached.");
        }
    }

    /// Handles a message from the hub. Returns the pad it triggered, if any.
    pub fn handle_event(&self, event: &MidiEvent) -> Option<PadIndex> {
        if !event.is_sounding_note_on() {
            return None;
        }

        let profile = self.active_profile();
        if event.channel() != profile.channel {
            debug!(
                channel = event.channel(),
                expected = profile.channel,
                "Ignoring note on another channel."
            );
            return None;
        }

        let pad = match PadIndex::from_note(event.data1(), profile.pad_base_note) {
            Some(pad) => pad,
            None => {
                debug!(note = event.data1(), "Note is outside the pads.");
                return None;
            }
        };

        self.trigger(pad, event.data2());
        Some(pad)
    }

    /// Lights the pad and plays its sample at the given MIDI velocity. A cached
    /// sample starts right away; anything else is loaded in the background and
    /// plays once decoded.
    pub fn trigger(&self, pad: PadIndex, velocity: u8) {
        self.flashes
            .lock()
            .insert(pad, Instant::now() + self.settings.flash_duration);

        let assignment = self.pads.read().get(pad);
        if !assignment.is_assigned() {
            debug!(pad = pad.get(), "Pad has no sample.");
            return;
        }

        let gain = velocity as f32 / 127.0;
        match self.engine.cached(&assignment.sample_path) {
            Some(buffer) => self.engine.play_buffer(&buffer, gain, assignment.pitch()),
            None => {
                debug!(
                    pad = pad.get(),
                    sample = assignment.sample_path,
                    "Loading pad sample."
                );
                self.loader.play(PlayRequest {
                    pad,
                    pitch: assignment.pitch(),
                    sample_path: assignment.sample_path,
                    gain,
                });
            }
        }
    }

    /// A manual press: plays the pad and echoes its note to every output on the
    /// active profile's channel.
    pub fn select_pad(&self, pad: PadIndex) {
        *self.selected.lock() = Some(pad);
        self.trigger(pad, self.settings.note_velocity);

        let profile = self.active_profile();
        match pad.note(profile.pad_base_note) {
            Some(note) => self.hub.send_note(
                Note::new(note)
                    .velocity(self.settings.note_velocity)
                    .duration(self.settings.note_duration)
                    .channel(profile.channel),
            ),
            None => debug!(pad = pad.get(), "Pad note is out of range, not sending."),
        }
    }

    /// The last manually selected pad.
    pub fn selected(&self) -> Option<PadIndex> {
        *self.selected.lock()
    }

    pub fn is_flashing(&self, pad: PadIndex) -> bool {
        self.flashes
            .lock()
            .get(&pad)
            .is_some_and(|until| Instant::now() < *until)
    }

    /// Every pad currently lit, in pad order.
    pub fn flashing_pads(&self) -> Vec<PadIndex> {
        let now = Instant::now();
        let mut flashes = self.flashes.lock();
        flashes.retain(|_, until| now < *until);
        let mut pads: Vec<PadIndex> = flashes.keys().copied().collect();
        pads.sort();
        pads
    }

    /// Loads every assigned sample ahead of time. Returns how many loaded.
    pub fn preload(&self) -> usize {
        let paths = self.pads.read().sample_paths();
        let loaded = paths
            .iter()
            .filter(|path| match self.engine.load_sample(path, path) {
                Ok(_) => true,
                Err(e) => {
                    warn!(
                        sample = path.as_str(),
                        err = e.to_string(),
                        "Unable to preload sample."
                    );
                    false
                }
            })
            .count();
        info!(loaded, total = paths.len(), "Preloaded pad samples.");
        loaded
    }

    /// Sends one of the active profile's macros as a control change.
    pub fn send_macro(&self, macro_id: u32, value: f64) -> Result<(), ProfileError> {
        let profile = self.active_profile();
        let mapping = profile
            .find_macro(macro_id)
            .ok_or(ProfileError::MacroNotFound(macro_id))?;
        debug!(label = mapping.label, value, "Sending macro.");
        self.hub
            .send_control_change(mapping.control_number, value, Some(profile.channel), None);
        Ok(())
    }

    pub fn profiles(&self) -> ProfileSet {
        self.profiles.read().clone()
    }

    pub fn active_profile(&self) -> MidiProfile {
        self.profiles.read().active()
    }

    pub fn pads(&self) -> PadBank {
        self.pads.read().clone()
    }

    /// Changes the profiles. The change is only kept if it succeeds and persists.
    pub fn update_profiles<F, R>(&self, update: F) -> Result<R, ProfileError>
    where
        F: FnOnce(&mut ProfileSet) -> Result<R, ProfileError>,
    {
        let mut profiles = self.profiles.write();
        let mut updated = profiles.clone();
        let result = update(&mut updated)?;
        updated.save(self.store.as_ref())?;

        let channel = updated.active().channel;
        *profiles = updated;
        self.hub.set_default_channel(channel);
        Ok(result)
    }

    /// Changes the pad bank. The change is only kept if it persists.
    pub fn update_pads<F, R>(&self, update: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut PadBank) -> R,
    {
        let mut pads = self.pads.write();
        let mut updated = pads.clone();
        let result = update(&mut updated);
        store::save(self.store.as_ref(), PAD_ASSIGNMENTS_KEY, &updated)?;
        *pads = updated;
        Ok(result)
    }

    /// Writes the active profile and the pad bank to a file in the directory named
    /// after the profile.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, StoreError> {
        export_config(&self.active_profile(), &self.pads.read(), dir)
    }

    pub fn engine(&self) -> &Arc<SampleEngine> {
        &self.engine
    }
}

/// Writes a profile and a pad bank to `<profile name>_config.json` in the directory.
pub fn export_config(
    profile: &MidiProfile,
    pads: &PadBank,
    dir: &Path,
) -> Result<PathBuf, StoreError> {
    store::export_config(&ExportedConfig { profile, pads }, &profile.name, dir)
}

impl fmt::Debug for PadController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PadController")
            .field("profile", &self.profiles.read().active_id())
            .field("pads", &self.pads.read().len())
            .field("attached", &self.subscription.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        audio::mock as mock_audio,
        midi::{mock, Device, Direction},
        pads::{PadUpdate, ProfileUpdate},
        store::MemoryStore,
        testutil::{eventually, wav_bytes, MemoryFetcher},
    };

    struct Harness {
        controller: Arc<PadController>,
        hub: Arc<DeviceHub>,
        access: Arc<mock::Access>,
        output: Arc<mock_audio::Output>,
        fetcher: Arc<MemoryFetcher>,
        store: Arc<MemoryStore>,
    }

    fn harness(settings: PadSettings) -> Harness {
        let host = mock::Host::new();
        let access = host.access();
        access.add_device(Device::new("in-1", "Pads", Direction::Input));
        access.add_device(Device::new("out-1", "Sampler", Direction::Output));
        let hub = Arc::new(DeviceHub::new(Arc::new(host)));
        assert!(hub.initialize());

        let output = Arc::new(mock_audio::Output::with_format("mock", 1, 44100));
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("Kick_808.wav", wav_bytes(&[vec![1.0, 1.0, 1.0, 1.0]], 44100));
        let engine = Arc::new(SampleEngine::new(output.clone(), fetcher.clone(), 32, 0.8).unwrap());

        let store = Arc::new(MemoryStore::new());
        let controller = PadController::new(hub.clone(), engine, store.clone(), settings);
        Harness {
            controller,
            hub,
            access,
            output,
            fetcher,
            store,
        }
    }

    impl Harness {
        fn wait_for_voices(&self, count: usize) {
            eventually(
                || self.controller.engine.active_voices() == count,
                "Pad sample never started",
            );
        }
    }

    fn note_on(channel: u8, note: u8, velocity: u8) -> MidiEvent {
        MidiEvent::new(0x90 | channel, note, velocity, "in-1")
    }

    #[test]
    fn test_note_to_pad() {
        let h = harness(PadSettings::default());
        assert_eq!(h.controller.handle_event(&note_on(0, 35, 100)), None);
        assert_eq!(h.controller.handle_event(&note_on(0, 36, 100)), PadIndex::new(1));
        assert_eq!(h.controller.handle_event(&note_on(0, 51, 100)), PadIndex::new(16));
        assert_eq!(h.controller.handle_event(&note_on(0, 52, 100)), None);
    }

    #[test]
    fn test_ignored_events() {
        let h = harness(PadSettings::default());
        assert_eq!(h.controller.handle_event(&note_on(1, 36, 100)), None);
        assert_eq!(h.controller.handle_event(&note_on(0, 36, 0)), None);
        assert_eq!(
            h.controller
                .handle_event(&MidiEvent::new(0x80, 36, 100, "in-1")),
            None
        );
        assert_eq!(
            h.controller
                .handle_event(&MidiEvent::new(0xB0, 36, 100, "in-1")),
            None
        );
        assert!(h.controller.flashing_pads().is_empty());
        assert_eq!(h.fetcher.fetch_count("Kick_808.wav"), 0);
    }

    #[test]
    fn test_attached_trigger_plays() {
        let h = harness(PadSettings::default());
        h.controller.attach();

        h.access.inject("in-1", &[0x90, 36, 127]);
        assert!(h.controller.is_flashing(PadIndex::new(1).unwrap()));
        h.wait_for_voices(1);
        assert_eq!(h.output.render(1), vec![1.0]);

        // Unassigned pads flash without playing.
        h.access.inject("in-1", &[0x90, 37, 127]);
        assert_eq!(h.controller.flashing_pads().len(), 2);
        assert_eq!(h.controller.engine.active_voices(), 1);

        h.controller.detach();
        h.access.inject("in-1", &[0x90, 36, 127]);
        assert_eq!(h.controller.engine.active_voices(), 1);
    }

    #[test]
    fn test_cached_pads_play_while_another_loads() {
        let h = harness(PadSettings::default());
        h.access.add_device(Device::new("in-2", "Keys", Direction::Input));
        h.fetcher.insert("Snare_Long.wav", wav_bytes(&[vec![0.5; 4]], 44100));
        h.fetcher.delay("Snare_Long.wav", Duration::from_millis(500));
        h.controller
            .update_pads(|pads| pads.assign(PadIndex::new(2).unwrap(), "Snare_Long.wav"))
            .unwrap();
        h.controller
            .engine
            .load_sample("Kick_808.wav", "Kick_808.wav")
            .unwrap();
        h.controller.attach();

        let start = Instant::now();
        h.access.inject("in-2", &[0x90, 37, 100]);
        assert!(start.elapsed() < Duration::from_millis(100));

        let start = Instant::now();
        h.access.inject("in-1", &[0x90, 36, 100]);
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(h.controller.engine.active_voices(), 1);
        assert_eq!(h.controller.flashing_pads().len(), 2);

        h.wait_for_voices(2);
        assert!(h.controller.engine.cached("Snare_Long.wav").is_some());
    }

    #[test]
    fn test_velocity_scales_gain() {
        let h = harness(PadSettings::default());
        h.controller.trigger(PadIndex::new(1).unwrap(), 64);
        h.wait_for_voices(1);
        let rendered = h.output.render(1);
        assert!((rendered[0] - 64.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_flash_expires() {
        let h = harness(PadSettings {
            flash_duration: Duration::from_millis(20),
            ..Default::default()
        });
        let pad = PadIndex::new(3).unwrap();
        h.controller.trigger(pad, 100);
        assert!(h.controller.is_flashing(pad));

        thread::sleep(Duration::from_millis(40));
        assert!(!h.controller.is_flashing(pad));
        assert!(h.controller.flashing_pads().is_empty());
    }

    #[test]
    fn test_missing_sample_is_skipped() {
        let h = harness(PadSettings::default());
        h.controller
            .update_pads(|pads| pads.assign(PadIndex::new(2).unwrap(), "missing.wav"))
            .unwrap();

        assert_eq!(h.controller.handle_event(&note_on(0, 37, 100)), PadIndex::new(2));
        eventually(
            || h.fetcher.fetch_count("missing.wav") == 1,
            "Missing sample never fetched",
        );
        assert_eq!(h.controller.preload(), 1);
        assert_eq!(h.controller.engine.active_voices(), 0);
        assert!(h.controller.engine.cached("missing.wav").is_none());
    }

    #[test]
    fn test_select_pad_echoes_note() {
        let h = harness(PadSettings::default());
        let pad = PadIndex::new(1).unwrap();
        h.controller.select_pad(pad);

        assert_eq!(h.controller.selected(), Some(pad));
        assert_eq!(h.access.sent(), vec![("out-1".to_string(), vec![0x90, 36, 100])]);
        h.wait_for_voices(1);
        let rendered = h.output.render(1);
        assert!((rendered[0] - 100.0 / 127.0).abs() < 1e-6);

        eventually(|| h.access.sent().len() == 2, "Note-off never sent");
        assert_eq!(h.access.sent()[1], ("out-1".to_string(), vec![0x80, 36, 0]));
    }

    #[test]
    fn test_profile_changes_follow() {
        let h = harness(PadSettings::default());
        h.controller
            .update_profiles(|profiles| {
                profiles.update(
                    "default-mpc",
                    ProfileUpdate {
                        channel: Some(9),
                        pad_base_note: Some(60),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(h.hub.default_channel(), 9);
        assert_eq!(h.controller.handle_event(&note_on(0, 60, 100)), None);
        assert_eq!(h.controller.handle_event(&note_on(9, 60, 100)), PadIndex::new(1));

        // A failed change leaves everything as it was.
        assert!(h
            .controller
            .update_profiles(|profiles| profiles.delete("nope"))
            .is_err());
        assert_eq!(h.controller.active_profile().channel, 9);

        let created = h
            .controller
            .update_profiles(|profiles| Ok(profiles.create().id.clone()))
            .unwrap();
        assert_eq!(h.controller.active_profile().id, created);
        assert_eq!(h.hub.default_channel(), 0);

        // Persisted for the next controller.
        let reloaded = ProfileSet::load(h.store.as_ref());
        assert_eq!(reloaded, h.controller.profiles());
    }

    #[test]
    fn test_send_macro() {
        let h = harness(PadSettings::default());
        h.controller.send_macro(1, 200.0).unwrap();
        assert_eq!(h.access.sent(), vec![("out-1".to_string(), vec![0xB0, 74, 127])]);
        assert!(matches!(
            h.controller.send_macro(9, 1.0),
            Err(ProfileError::MacroNotFound(9))
        ));
    }

    #[test]
    fn test_pad_changes_persist() {
        let h = harness(PadSettings::default());
        h.controller
            .update_pads(|pads| {
                pads.update(
                    PadIndex::new(4).unwrap(),
                    PadUpdate {
                        sample_path: Some("Kick_808.wav".to_string()),
                        tune_coarse: Some(12),
                        ..Default::default()
                    },
                )
            })
            .unwrap();

        let stored: PadBank = store::load_or_default(h.store.as_ref(), PAD_ASSIGNMENTS_KEY);
        assert_eq!(stored, h.controller.pads());

        // An octave up plays every other frame.
        h.controller.trigger(PadIndex::new(4).unwrap(), 127);
        h.wait_for_voices(1);
        assert_eq!(h.output.render(3), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_export() {
        let h = harness(PadSettings::default());
        let dir = tempfile::tempdir().unwrap();
        let path = h.controller.export(dir.path()).unwrap();
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("MPC_Hardware_Default_config.json")
        );

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["profile"]["padBaseNote"], 36);
        assert_eq!(written["pads"]["1"]["samplePath"], "Kick_808.wav");
    }
}
