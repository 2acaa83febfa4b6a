// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::pads::PadSettings;

mod audio;
mod error;
mod midi;
mod pads;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::midi::Midi;
pub use self::pads::Pads;

const DEFAULT_STATE_PATH: &str = "padforge-state.json";

/// The prefix of environment variables overriding the config file, e.g.
/// `PADFORGE__AUDIO__DEVICE=mock`.
const ENV_PREFIX: &str = "PADFORGE";

/// All settings, from an optional YAML file overlaid with the environment.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    audio: Option<Audio>,
    midi: Option<Midi>,
    pads: Option<Pads>,

    /// The JSON file holding profiles and pad assignments.
    state: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from the given file, if any, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = path.display().to_string(), "Loading config file.");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    pub fn midi(&self) -> Midi {
        self.midi.clone().unwrap_or_default()
    }

    pub fn pads(&self) -> Pads {
        self.pads.clone().unwrap_or_default()
    }

    pub fn state(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH))
    }

    /// The controller settings drawn from the MIDI and pad sections.
    pub fn pad_settings(&self) -> Result<PadSettings, ConfigError> {
        let midi = self.midi();
        Ok(PadSettings {
            note_velocity: midi.note_velocity(),
            note_duration: midi.note_duration()?,
            flash_duration: self.pads().flash_duration()?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.audio().validate()?;
        self.midi().validate()?;
        self.pad_settings()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, time::Duration};

    use super::*;

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let settings = Settings::from_yaml("")?;
        let audio = settings.audio();
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.fft_size(), 2048);
        assert_eq!(audio.smoothing(), 0.8);
        assert_eq!(audio.frame_interval()?, Duration::from_millis(16));
        assert!(audio.sample_root().is_none());

        let midi = settings.midi();
        assert_eq!(midi.host(), "midir");
        assert_eq!(midi.default_channel(), 0);
        assert_eq!(midi.watch_interval()?, Duration::from_millis(500));

        let pads = settings.pad_settings()?;
        assert_eq!(pads.note_velocity, 100);
        assert_eq!(pads.note_duration, Duration::from_millis(200));
        assert_eq!(pads.flash_duration, Duration::from_millis(100));
        assert!(settings.pads().preload());
        assert_eq!(settings.state(), PathBuf::from("padforge-state.json"));
        Ok(())
    }

    #[test]
    fn full() -> Result<(), Box<dyn Error>> {
        let settings = Settings::from_yaml(
            r#"
            audio:
              device: mock-device
              fft_size: 512
              smoothing: 0.5
              frame_interval: 33ms
              sample_root: /samples
            midi:
              host: mock
              default_channel: 9
              note_velocity: 90
              note_duration: 1s
              watch_interval: 2s
            pads:
              flash_duration: 250ms
              preload: false
            state: /tmp/state.json
            "#,
        )?;

        let audio = settings.audio();
        assert_eq!(audio.device(), "mock-device");
        assert_eq!(audio.fft_size(), 512);
        assert_eq!(audio.frame_interval()?, Duration::from_millis(33));
        assert_eq!(audio.sample_root(), Some(Path::new("/samples")));

        let midi = settings.midi();
        assert_eq!(midi.host(), "mock");
        assert_eq!(midi.default_channel(), 9);
        assert_eq!(midi.watch_interval()?, Duration::from_secs(2));

        let pads = settings.pad_settings()?;
        assert_eq!(pads.note_velocity, 90);
        assert_eq!(pads.note_duration, Duration::from_secs(1));
        assert_eq!(pads.flash_duration, Duration::from_millis(250));
        assert!(!settings.pads().preload());
        assert_eq!(settings.state(), PathBuf::from("/tmp/state.json"));
        Ok(())
    }

    #[test]
    fn invalid_values() {
        for yaml in [
            "audio:\n  fft_size: 1000",
            "audio:\n  fft_size: 16",
            "audio:\n  fft_size: 65536",
            "audio:\n  smoothing: 1.5",
            "audio:\n  frame_interval: soon",
            "midi:\n  default_channel: 16",
            "midi:\n  note_velocity: 128",
            "pads:\n  flash_duration: 10 parsecs",
        ] {
            assert!(
                matches!(Settings::from_yaml(yaml), Err(ConfigError::Invalid { .. })),
                "{} should be invalid",
                yaml
            );
        }

        assert!(matches!(
            Settings::from_yaml("audio:\n  fft_size: lots"),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn load_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("padforge.yaml");
        std::fs::write(&path, "audio:\n  device: mock\n")?;

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.audio().device(), "mock");

        assert!(Settings::load(Some(&dir.path().join("missing.yaml"))).is_err());
        Ok(())
    }
}
