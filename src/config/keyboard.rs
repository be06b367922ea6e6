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
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::ConfigError;
use crate::audio::{BufferLibrary, Output};
use crate::keymap::{Key, KeyMap};
use crate::tuning::{Tuning, TuningTable};
use crate::voice::{Octave, TriggerMode, Voice, DEFAULT_ENVELOPE_SECS, DEFAULT_PLAYBACK_RATE};

/// A YAML representation of a voice.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct VoiceConfig {
    /// The name of the sample in the buffer library.
    sample: Option<String>,

    /// The pitch fader position. Snapped to the tuning's scale when quantized.
    #[serde(default = "default_pitch")]
    pitch: f64,

    /// The octave multiplier: 0.5, 1, 2 or 4.
    #[serde(default)]
    octave: Octave,

    /// The volume in decibels.
    #[serde(default)]
    volume: f64,

    /// Attack time in seconds.
    #[serde(default = "default_envelope")]
    attack: f64,

    /// Release time in seconds.
    #[serde(default = "default_envelope")]
    release: f64,

    #[serde(default)]
    trigger_mode: TriggerMode,

    /// Draw a random pitch on every trigger.
    #[serde(default)]
    randomize: bool,

    /// The scale to quantize the pitch fader to. Unquantized if not set.
    tuning: Option<String>,

    /// A pitch set directly rather than with the fader. Used as is in place of
    /// `pitch`, without snapping to the scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_pitch: Option<f64>,
}

fn default_pitch() -> f64 {
    DEFAULT_PLAYBACK_RATE
}

fn default_envelope() -> f64 {
    DEFAULT_ENVELOPE_SECS
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            sample: None,
            pitch: default_pitch(),
            octave: Octave::default(),
            volume: 0.0,
            attack: default_envelope(),
            release: default_envelope(),
            trigger_mode: TriggerMode::default(),
            randomize: false,
            tuning: None,
            base_pitch: None,
        }
    }
}

impl VoiceConfig {
    /// Creates a voice configuration playing the given sample with default settings.
    pub fn new(sample: &str) -> VoiceConfig {
        VoiceConfig {
            sample: Some(sample.to_string()),
            ..Default::default()
        }
    }

    pub fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn octave(&self) -> Octave {
        self.octave
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.trigger_mode
    }

    pub fn randomize(&self) -> bool {
        self.randomize
    }

    pub fn tuning(&self) -> Option<&str> {
        self.tuning.as_deref()
    }

    pub fn base_pitch(&self) -> Option<f64> {
        self.base_pitch
    }

    /// Records a voice's settings.
    pub fn from_voice(voice: &Voice) -> VoiceConfig {
        // A voice on a scale step is restored by replaying its fader position. A tuned
        // voice whose pitch was set directly keeps that pitch, which may lie outside
        // the scale's octave.
        let (pitch, base_pitch) = match (voice.step(), voice.tuning()) {
            (Some(_), _) => (voice.fader(), None),
            (None, Tuning::Unquantized) => (voice.base_pitch(), None),
            (None, Tuning::Scale(_)) => (voice.fader(), Some(voice.base_pitch())),
        };
        VoiceConfig {
            sample: voice.buffer_name().map(str::to_string),
            pitch,
            octave: voice.octave(),
            volume: voice.volume(),
            attack: voice.attack(),
            release: voice.release(),
            trigger_mode: voice.trigger_mode(),
            randomize: voice.randomize(),
            tuning: voice.tuning().name().map(str::to_string),
            base_pitch,
        }
    }

    /// Builds a voice from this configuration. A sample missing from the library
    /// leaves the voice silent rather than failing the keyboard.
    pub fn to_voice(
        &self,
        output: Arc<dyn Output>,
        buffers: &BufferLibrary,
        tunings: &TuningTable,
    ) -> Result<Voice, ConfigError> {
        let mut voice = match self.sample.as_deref() {
            Some(name) => match buffers.get(name) {
                Some(buffer) => Voice::with_buffer(output, buffer.clone()),
                None => {
                    warn!(sample = name, "Sample not in library, voice will be silent");
                    Voice::new(output)
                }
            },
            None => Voice::new(output),
        };

        voice.set_tuning(Tuning::from_name(self.tuning.as_deref()));
        voice.set_octave(self.octave);
        match self.base_pitch {
            Some(pitch) => voice.set_base_pitch(pitch),
            None => voice.set_pitch_fader(self.pitch, tunings)?,
        }
        voice.set_volume(self.volume);
        voice.set_attack(self.attack)?;
        voice.set_release(self.release)?;
        voice.set_trigger_mode(self.trigger_mode);
        voice.set_randomize(self.randomize);
        Ok(voice)
    }
}

/// A YAML representation of a keyboard.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct KeyboardConfig {
    name: String,

    /// Start from the default bindings before applying `keys`.
    #[serde(default)]
    defaults: bool,

    /// Voices by key.
    #[serde(default)]
    keys: BTreeMap<Key, VoiceConfig>,
}

impl KeyboardConfig {
    /// Creates a new keyboard configuration.
    pub fn new(name: &str, defaults: bool, keys: BTreeMap<Key, VoiceConfig>) -> KeyboardConfig {
        KeyboardConfig {
            name: name.to_string(),
            defaults,
            keys,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> bool {
        self.defaults
    }

    pub fn keys(&self) -> &BTreeMap<Key, VoiceConfig> {
        &self.keys
    }

    /// Records every binding of a keyboard.
    pub fn from_keymap(keymap: &KeyMap) -> KeyboardConfig {
        KeyboardConfig {
            name: keymap.name().to_string(),
            defaults: false,
            keys: keymap
                .voices()
                .map(|(key, voice)| (key.clone(), VoiceConfig::from_voice(voice)))
                .collect(),
        }
    }

    /// Builds a keyboard from this configuration.
    pub fn to_keymap(
        &self,
        output: Arc<dyn Output>,
        buffers: &BufferLibrary,
        tunings: &TuningTable,
    ) -> Result<KeyMap, ConfigError> {
        let mut keymap = if self.defaults {
            KeyMap::with_defaults(&self.name, output.clone(), buffers)
        } else {
            KeyMap::new(&self.name)
        };

        for (key, voice) in self.keys.iter() {
            if key.as_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "keyboard {} binds an empty key",
                    self.name
                )));
            }
            keymap.bind(key.clone(), voice.to_voice(output.clone(), buffers, tunings)?);
        }
        Ok(keymap)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;
    use crate::audio::{mock, SampleBuffer};

    fn setup() -> (Arc<dyn Output>, BufferLibrary, TuningTable) {
        let (output, _completions) = mock::Output::new("mock-config");
        let mut buffers = BufferLibrary::new();
        buffers.insert(SampleBuffer::new("kick", vec![0.0; 16], 1, 44100));
        buffers.insert(SampleBuffer::new("snare", vec![0.0; 16], 1, 44100));
        (Arc::new(output), buffers, TuningTable::builtin())
    }

    #[test]
    fn test_voice_config_defaults() {
        let yaml = r#"
            sample: kick
        "#;

        let config: VoiceConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config, VoiceConfig::new("kick"));
    }

    #[test]
    fn test_voice_config_to_voice() {
        let yaml = r#"
            sample: snare
            pitch: 1.6
            octave: 2
            volume: -3.0
            attack: 0.2
            release: 0.4
            trigger_mode: rapid
            tuning: just_fifths
        "#;

        let config: VoiceConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let (output, buffers, tunings) = setup();
        let voice = config.to_voice(output, &buffers, &tunings).unwrap();
        assert_eq!(voice.buffer_name(), Some("snare"));
        assert_eq!(voice.base_pitch(), 1.5);
        assert_eq!(voice.playback_rate(), 3.0);
        assert_eq!(voice.volume(), -3.0);
        assert_eq!(voice.attack(), 0.2);
        assert_eq!(voice.release(), 0.4);
        assert_eq!(voice.trigger_mode(), TriggerMode::Rapid);
        assert_eq!(voice.tuning(), &Tuning::Scale("just_fifths".to_string()));
    }

    #[test]
    fn test_invalid_octave_rejected() {
        let yaml = r#"
            sample: kick
            octave: 3
        "#;

        let result = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<VoiceConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_envelope_rejected() {
        let (output, buffers, tunings) = setup();
        let config = VoiceConfig {
            attack: 2.0,
            ..VoiceConfig::new("kick")
        };
        assert!(matches!(
            config.to_voice(output, &buffers, &tunings),
            Err(ConfigError::Voice(_))
        ));
    }

    #[test]
    fn test_missing_sample_is_silent() {
        let (output, buffers, tunings) = setup();
        let voice = VoiceConfig::new("cowbell")
            .to_voice(output, &buffers, &tunings)
            .unwrap();
        assert!(voice.buffer().is_none());
    }

    #[test]
    fn test_keyboard_round_trip() {
        let (output, buffers, tunings) = setup();
        let mut keys = BTreeMap::new();
        keys.insert(
            Key::from("a"),
            VoiceConfig {
                pitch: 1.3,
                tuning: Some("just_fifths".to_string()),
                trigger_mode: TriggerMode::Single,
                ..VoiceConfig::new("kick")
            },
        );
        keys.insert(
            Key::from("b"),
            VoiceConfig {
                pitch: 0.75,
                octave: Octave::Down,
                randomize: true,
                ..VoiceConfig::new("snare")
            },
        );
        let config = KeyboardConfig::new("main", false, keys);

        let keymap = config.to_keymap(output.clone(), &buffers, &tunings).unwrap();
        assert_eq!(keymap.len(), 2);
        assert_eq!(keymap.get_voice(&Key::from("a")).unwrap().base_pitch(), 1.0);
        assert_eq!(keymap.get_voice(&Key::from("b")).unwrap().playback_rate(), 0.375);

        let saved = KeyboardConfig::from_keymap(&keymap);
        assert_eq!(saved, config);

        // Records survive a trip through another serde format.
        let json = serde_json::to_string(&saved).unwrap();
        let restored: KeyboardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
        let rebuilt = restored.to_keymap(output, &buffers, &tunings).unwrap();
        assert_eq!(
            rebuilt.get_voice(&Key::from("a")).unwrap().trigger_mode(),
            TriggerMode::Single
        );
    }

    #[test]
    fn test_tuned_voice_with_direct_rate_reloads() {
        let (output, buffers, tunings) = setup();
        let mut voice = VoiceConfig {
            tuning: Some("just_fifths".to_string()),
            pitch: 1.6,
            ..VoiceConfig::new("kick")
        }
        .to_voice(output.clone(), &buffers, &tunings)
        .unwrap();
        voice.set_playback_rate(3.0);

        let mut keymap = KeyMap::new("main");
        keymap.bind(Key::from("a"), voice);
        let saved = KeyboardConfig::from_keymap(&keymap);
        assert_eq!(saved.keys()[&Key::from("a")].base_pitch(), Some(3.0));

        let json = serde_json::to_string(&saved).unwrap();
        let restored: KeyboardConfig = serde_json::from_str(&json).unwrap();
        let rebuilt = restored.to_keymap(output, &buffers, &tunings).unwrap();
        let voice = rebuilt.get_voice(&Key::from("a")).unwrap();
        assert_eq!(voice.playback_rate(), 3.0);
        assert_eq!(voice.tuning(), &Tuning::Scale("just_fifths".to_string()));
        assert!(voice.fraction_label(&tunings).is_none());
    }

    #[test]
    fn test_keyboard_defaults_then_overrides() {
        let yaml = r#"
            name: pads
            defaults: true
            keys:
              q:
                sample: snare
                trigger_mode: single
        "#;

        let config: KeyboardConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let (output, buffers, tunings) = setup();
        let keymap = config.to_keymap(output, &buffers, &tunings).unwrap();
        assert_eq!(keymap.name(), "pads");
        assert_eq!(keymap.len(), crate::keymap::DEFAULT_KEYS.len());
        let q = keymap.get_voice(&Key::from("q")).unwrap();
        assert_eq!(q.buffer_name(), Some("snare"));
        assert_eq!(q.trigger_mode(), TriggerMode::Single);
        assert_eq!(
            keymap.get_voice(&Key::from("w")).unwrap().trigger_mode(),
            TriggerMode::Loop
        );
    }
}
