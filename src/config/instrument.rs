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
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ConfigError;
use super::keyboard::KeyboardConfig;
use crate::audio::{BufferLibrary, Output};
use crate::context::Context;
use crate::engine::{RandomPitch, DEFAULT_RANDOM_PITCH_MAX, DEFAULT_RANDOM_PITCH_MIN};
use crate::tuning::{Scale, TuningTable};

/// A scale declared alongside the built-in ones.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct ScaleConfig {
    name: String,

    /// Steps as "n/d" fractions, ascending, within one octave.
    #[serde(default)]
    steps: Vec<String>,
}

impl ScaleConfig {
    pub fn new(name: &str, steps: &[&str]) -> ScaleConfig {
        ScaleConfig {
            name: name.to_string(),
            steps: steps.iter().map(|step| step.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parses the steps into a scale.
    pub fn to_scale(&self) -> Result<Scale, ConfigError> {
        Scale::parse(&self.name, &self.steps).map_err(ConfigError::Invalid)
    }
}

/// The range randomized voices draw from.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, PartialEq)]
pub struct RandomPitchConfig {
    #[serde(default = "default_random_min")]
    min: f64,
    #[serde(default = "default_random_max")]
    max: f64,
}

fn default_random_min() -> f64 {
    DEFAULT_RANDOM_PITCH_MIN
}

fn default_random_max() -> f64 {
    DEFAULT_RANDOM_PITCH_MAX
}

impl Default for RandomPitchConfig {
    fn default() -> Self {
        RandomPitchConfig {
            min: default_random_min(),
            max: default_random_max(),
        }
    }
}

impl RandomPitchConfig {
    pub fn to_random_pitch(&self) -> Result<RandomPitch, ConfigError> {
        Ok(RandomPitch::new(self.min, self.max)?)
    }
}

/// The configuration for a whole instrument: its keyboards, any extra scales and
/// how randomized voices pick their pitch.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct InstrumentConfig {
    /// Keyboards in order. The first is current when the instrument starts.
    keyboards: Vec<KeyboardConfig>,

    #[serde(default)]
    scales: Vec<ScaleConfig>,

    #[serde(default)]
    random_pitch: RandomPitchConfig,
}

impl InstrumentConfig {
    /// Creates a new instrument configuration.
    pub fn new(
        keyboards: Vec<KeyboardConfig>,
        scales: Vec<ScaleConfig>,
        random_pitch: RandomPitchConfig,
    ) -> InstrumentConfig {
        InstrumentConfig {
            keyboards,
            scales,
            random_pitch,
        }
    }

    /// Parse an instrument from a YAML file.
    pub fn deserialize(path: &Path) -> Result<InstrumentConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<InstrumentConfig>()?)
    }

    pub fn keyboards(&self) -> &[KeyboardConfig] {
        &self.keyboards
    }

    pub fn scales(&self) -> &[ScaleConfig] {
        &self.scales
    }

    /// The built-in scales plus the declared ones. A declared scale replaces a
    /// built-in scale of the same name.
    pub fn tunings(&self) -> Result<TuningTable, ConfigError> {
        let mut tunings = TuningTable::builtin();
        for scale in self.scales.iter() {
            tunings.insert(scale.to_scale()?);
        }
        Ok(tunings)
    }

    pub fn random_pitch(&self) -> Result<RandomPitch, ConfigError> {
        self.random_pitch.to_random_pitch()
    }

    /// Checks everything that can be checked without samples or an output: keyboard
    /// names, scales and the random pitch range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyboards.is_empty() {
            return Err(ConfigError::Invalid(
                "instrument has no keyboards".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for keyboard in self.keyboards.iter() {
            if !names.insert(keyboard.name()) {
                return Err(ConfigError::Invalid(format!(
                    "keyboard {} is declared more than once",
                    keyboard.name()
                )));
            }
        }
        self.tunings()?;
        self.random_pitch()?;
        Ok(())
    }

    /// Builds the instrument's context. Voices play on `output` using samples from
    /// `buffers`.
    pub fn build(
        &self,
        output: Arc<dyn Output>,
        buffers: BufferLibrary,
    ) -> Result<Context, ConfigError> {
        self.validate()?;
        let tunings = self.tunings()?;

        let mut keyboards = self.keyboards.iter();
        let first = keyboards
            .next()
            .ok_or_else(|| ConfigError::Invalid("instrument has no keyboards".to_string()))?
            .to_keymap(output.clone(), &buffers, &tunings)?;

        let mut built = Vec::new();
        for keyboard in keyboards {
            built.push(keyboard.to_keymap(output.clone(), &buffers, &tunings)?);
        }

        let mut context = Context::new(output, buffers, tunings, first);
        for keymap in built {
            context.add_keyboard(keymap)?;
        }

        info!(
            keyboards = context.keyboard_names().len(),
            current = context.current_keyboard_name(),
            "Instrument built"
        );
        Ok(context)
    }

    /// Records the state of a context. Scales that differ from the built-in ones are
    /// kept so voices tuned to them can be restored.
    pub fn from_context(context: &Context, random_pitch: RandomPitch) -> InstrumentConfig {
        let builtin = TuningTable::builtin();
        let keyboards = context
            .keyboard_names()
            .into_iter()
            .filter_map(|name| context.keyboard(name).ok())
            .map(KeyboardConfig::from_keymap)
            .collect();
        let scales = context
            .tunings()
            .names()
            .filter_map(|name| context.tunings().get(name))
            .filter(|scale| builtin.get(scale.name()) != Some(*scale))
            .map(|scale| ScaleConfig {
                name: scale.name().to_string(),
                steps: scale.fractions().iter().map(|f| f.to_string()).collect(),
            })
            .collect();

        InstrumentConfig {
            keyboards,
            scales,
            random_pitch: RandomPitchConfig {
                min: random_pitch.min(),
                max: random_pitch.max(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::audio::{mock, SampleBuffer};
    use crate::keymap::Key;
    use crate::tuning::Tuning;

    const INSTRUMENT: &str = r#"
scales:
  - name: septimal
    steps: ["1/1", "7/6", "3/2", "7/4"]
random_pitch:
  min: 0.75
  max: 1.5
keyboards:
  - name: main
    keys:
      a:
        sample: kick
        pitch: 1.8
        tuning: septimal
      s:
        sample: snare
        trigger_mode: rapid
  - name: pads
    defaults: true
"#;

    fn write_instrument(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn buffers() -> BufferLibrary {
        let mut buffers = BufferLibrary::new();
        buffers.insert(SampleBuffer::new("kick", vec![0.0; 16], 1, 44100));
        buffers.insert(SampleBuffer::new("snare", vec![0.0; 16], 1, 44100));
        buffers
    }

    #[test]
    fn test_deserialize_instrument() {
        let file = write_instrument(INSTRUMENT);
        let config = InstrumentConfig::deserialize(file.path()).unwrap();

        assert_eq!(config.keyboards().len(), 2);
        assert_eq!(config.keyboards()[0].name(), "main");
        assert!(config.keyboards()[1].defaults());
        assert_eq!(config.scales()[0].name(), "septimal");

        let random = config.random_pitch().unwrap();
        assert_eq!(random.min(), 0.75);
        assert_eq!(random.max(), 1.5);
    }

    #[test]
    fn test_build_instrument() {
        let file = write_instrument(INSTRUMENT);
        let config = InstrumentConfig::deserialize(file.path()).unwrap();
        let (output, _completions) = mock::Output::new("mock-instrument");

        let context = config.build(Arc::new(output), buffers()).unwrap();
        assert_eq!(context.keyboard_names(), vec!["main", "pads"]);
        assert_eq!(context.current_keyboard_name(), "main");

        let a = context.voice(&Key::from("a")).unwrap();
        assert_eq!(a.tuning(), &Tuning::Scale("septimal".to_string()));
        assert_eq!(a.base_pitch(), 1.75);
        assert_eq!(
            a.fraction_label(context.tunings()).unwrap().to_string(),
            "7/4"
        );
        assert!(context.voice(&Key::from("q")).is_err());
        assert_eq!(
            context.keyboard("pads").unwrap().len(),
            crate::keymap::DEFAULT_KEYS.len()
        );
    }

    #[test]
    fn test_missing_file() {
        let result = InstrumentConfig::deserialize(Path::new("/nonexistent/instrument.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_instruments() {
        let unsorted = InstrumentConfig::new(
            vec![KeyboardConfig::new("main", true, Default::default())],
            vec![ScaleConfig::new("bad", &["3/2", "1/1"])],
            RandomPitchConfig::default(),
        );
        assert!(matches!(
            unsorted.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let duplicate = InstrumentConfig::new(
            vec![
                KeyboardConfig::new("main", true, Default::default()),
                KeyboardConfig::new("main", false, Default::default()),
            ],
            Vec::new(),
            RandomPitchConfig::default(),
        );
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let empty = InstrumentConfig::new(Vec::new(), Vec::new(), RandomPitchConfig::default());
        assert!(empty.validate().is_err());

        let backwards = InstrumentConfig::new(
            vec![KeyboardConfig::new("main", true, Default::default())],
            Vec::new(),
            RandomPitchConfig { min: 2.0, max: 1.0 },
        );
        assert!(matches!(
            backwards.validate(),
            Err(ConfigError::Voice(_))
        ));
    }

    #[test]
    fn test_from_context_keeps_custom_scales() {
        let file = write_instrument(INSTRUMENT);
        let config = InstrumentConfig::deserialize(file.path()).unwrap();
        let (output, _completions) = mock::Output::new("mock-instrument");
        let context = config.build(Arc::new(output), buffers()).unwrap();

        let saved = InstrumentConfig::from_context(&context, config.random_pitch().unwrap());
        assert_eq!(saved.scales(), config.scales());
        assert_eq!(saved.keyboards().len(), 2);
        assert_eq!(saved.keyboards()[0], config.keyboards()[0]);
        assert_eq!(saved.random_pitch().unwrap(), config.random_pitch().unwrap());
    }
}
