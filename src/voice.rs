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

//! A voice is the playable sound bound to one key.
//!
//! The playback rate is never stored directly. A voice keeps its base pitch and its
//! octave, and the rate is always their product.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::{Output, PlaybackId, PlaybackRequest, SampleBuffer};
use crate::error::Error;
use crate::tuning::{Fraction, Step, Tuning, TuningTable};

/// Lowest accepted volume in decibels.
pub const MIN_VOLUME_DB: f64 = -20.0;

/// Highest accepted volume in decibels.
pub const MAX_VOLUME_DB: f64 = 20.0;

/// Lowest accepted playback rate.
pub const MIN_PLAYBACK_RATE: f64 = 1.0 / 16.0;

/// Highest accepted playback rate.
pub const MAX_PLAYBACK_RATE: f64 = 16.0;

/// Rate used when a caller supplies something unusable.
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

/// Default attack and release time in seconds.
pub const DEFAULT_ENVELOPE_SECS: f64 = 0.1;

/// How a voice responds to key presses.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Loop while the key is held, with attack and release ramps.
    #[default]
    Loop,
    /// Play once. Presses while it is sounding are ignored.
    Single,
    /// Play once per press, overlapping earlier presses.
    Rapid,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Loop => write!(f, "loop"),
            TriggerMode::Single => write!(f, "single"),
            TriggerMode::Rapid => write!(f, "rapid"),
        }
    }
}

/// The octave factor separated out of a voice's playback rate.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(try_from = "f64", into = "f64")]
pub enum Octave {
    /// One octave down (x0.5).
    Down,
    /// Original pitch (x1).
    #[default]
    Unison,
    /// One octave up (x2).
    Up,
    /// Two octaves up (x4).
    UpTwo,
}

impl Octave {
    pub const ALL: [Octave; 4] = [Octave::Down, Octave::Unison, Octave::Up, Octave::UpTwo];

    /// The multiplier this octave applies to the base pitch.
    pub fn factor(&self) -> f64 {
        match self {
            Octave::Down => 0.5,
            Octave::Unison => 1.0,
            Octave::Up => 2.0,
            Octave::UpTwo => 4.0,
        }
    }
}

impl TryFrom<f64> for Octave {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Octave::ALL
            .into_iter()
            .find(|octave| (octave.factor() - value).abs() < 1e-9)
            .ok_or_else(|| format!("octave must be one of 0.5, 1, 2 or 4, got {}", value))
    }
}

impl From<Octave> for f64 {
    fn from(octave: Octave) -> f64 {
        octave.factor()
    }
}

/// How the engine asks a voice to start playback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackStyle {
    /// Loop the sample, ramping up over the attack time.
    Looped { attack: Duration },
    /// Play the sample through once.
    OneShot,
}

/// Clamps a rate into the accepted range, falling back to the default for values
/// that have no sensible clamp.
fn sanitize_rate(rate: f64) -> f64 {
    if !rate.is_finite() || rate <= 0.0 {
        warn!(rate, "Unusable playback rate, using default");
        return DEFAULT_PLAYBACK_RATE;
    }
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

fn validate_envelope(parameter: &'static str, secs: f64) -> Result<f64, Error> {
    if !secs.is_finite() || secs <= 0.0 || secs > 1.0 {
        return Err(Error::invalid(parameter, secs, "must be within (0, 1] seconds"));
    }
    Ok(secs)
}

/// One playable sound with its pitch, envelope and trigger configuration.
pub struct Voice {
    /// Where playback instances are started.
    output: Arc<dyn Output>,
    /// The sample, shared with the buffer library.
    buffer: Option<SampleBuffer>,
    /// Pitch with the octave factored out.
    base_pitch: f64,
    octave: Octave,
    /// Last pitch fader position.
    fader: f64,
    /// Gain in decibels.
    volume: f64,
    /// Attack time in seconds.
    attack: f64,
    /// Release time in seconds.
    release: f64,
    trigger_mode: TriggerMode,
    randomize: bool,
    tuning: Tuning,
    /// The step selected by the last quantized fader move.
    step: Option<Step>,
    /// The looping instance while a LOOP trigger is held.
    loop_instance: Option<PlaybackId>,
    /// Every instance started and not yet finished or stopped.
    instances: Vec<PlaybackId>,
    /// Released loops still fading out in the output.
    releasing: Vec<PlaybackId>,
}

impl Voice {
    /// Creates a silent voice with default parameters.
    pub fn new(output: Arc<dyn Output>) -> Voice {
        Voice {
            output,
            buffer: None,
            base_pitch: DEFAULT_PLAYBACK_RATE,
            octave: Octave::Unison,
            fader: DEFAULT_PLAYBACK_RATE,
            volume: 0.0,
            attack: DEFAULT_ENVELOPE_SECS,
            release: DEFAULT_ENVELOPE_SECS,
            trigger_mode: TriggerMode::default(),
            randomize: false,
            tuning: Tuning::Unquantized,
            step: None,
            loop_instance: None,
            instances: Vec::new(),
            releasing: Vec::new(),
        }
    }

    /// Creates a voice with default parameters playing the given sample.
    pub fn with_buffer(output: Arc<dyn Output>, buffer: SampleBuffer) -> Voice {
        let mut voice = Voice::new(output);
        voice.buffer = Some(buffer);
        voice
    }

    /// Copies every parameter into a new voice on the same output. The copy shares
    /// the sample but none of the sounding instances.
    pub fn duplicate(&self) -> Voice {
        Voice {
            output: self.output.clone(),
            buffer: self.buffer.clone(),
            base_pitch: self.base_pitch,
            octave: self.octave,
            fader: self.fader,
            volume: self.volume,
            attack: self.attack,
            release: self.release,
            trigger_mode: self.trigger_mode,
            randomize: self.randomize,
            tuning: self.tuning.clone(),
            step: self.step,
            loop_instance: None,
            instances: Vec::new(),
            releasing: Vec::new(),
        }
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.buffer.as_ref()
    }

    /// The display name of the assigned sample.
    pub fn buffer_name(&self) -> Option<&str> {
        self.buffer.as_ref().map(SampleBuffer::name)
    }

    /// The full sample-rate multiplier, octave included. This is the rate the output
    /// plays at, so it stays within the accepted range whatever the octave.
    pub fn playback_rate(&self) -> f64 {
        (self.base_pitch * self.octave.factor()).clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
    }

    /// The pitch without the octave factor.
    pub fn base_pitch(&self) -> f64 {
        self.base_pitch
    }

    pub fn octave(&self) -> Octave {
        self.octave
    }

    pub fn fader(&self) -> f64 {
        self.fader
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn attack(&self) -> f64 {
        self.attack
    }

    pub fn release(&self) -> f64 {
        self.release
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.trigger_mode
    }

    pub fn randomize(&self) -> bool {
        self.randomize
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn step(&self) -> Option<Step> {
        self.step
    }

    /// True while a looping instance is sounding.
    pub fn is_playing(&self) -> bool {
        self.loop_instance.is_some()
    }

    /// True while any instance is sounding.
    pub fn is_sounding(&self) -> bool {
        !self.instances.is_empty()
    }

    /// Number of instances sounding.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// True while a released loop is still fading out.
    pub fn is_releasing(&self) -> bool {
        !self.releasing.is_empty()
    }

    /// Returns true if the instance was started by this voice and has not finished,
    /// including released loops that are still fading out.
    pub fn owns(&self, id: PlaybackId) -> bool {
        self.instances.contains(&id) || self.releasing.contains(&id)
    }

    /// Sets the volume in decibels, clamped to the accepted range. Applies to every
    /// sounding instance immediately.
    pub fn set_volume(&mut self, db: f64) {
        let db = if db.is_finite() {
            db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
        } else {
            0.0
        };
        self.volume = db;
        for id in self.instances.iter() {
            self.output.set_volume(*id, db);
        }
    }

    /// Sets the full playback rate. The octave is kept and the base pitch follows.
    /// A looping instance glides to the new rate, anything else picks it up on the
    /// next trigger.
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.base_pitch = sanitize_rate(rate) / self.octave.factor();
        self.step = None;
        self.apply_rate();
    }

    /// Sets the pitch with the octave factored out. The voice is no longer on a
    /// scale step until the fader next moves.
    pub fn set_base_pitch(&mut self, pitch: f64) {
        self.store_base_pitch(pitch);
        self.apply_rate();
    }

    /// Sets the base pitch without touching anything already sounding.
    pub(crate) fn store_base_pitch(&mut self, pitch: f64) {
        self.base_pitch = self.bound_base_pitch(pitch);
        self.step = None;
    }

    /// Limits a base pitch so that, with the current octave, the rate stays in range.
    fn bound_base_pitch(&self, pitch: f64) -> f64 {
        let factor = self.octave.factor();
        sanitize_rate(pitch).clamp(MIN_PLAYBACK_RATE / factor, MAX_PLAYBACK_RATE / factor)
    }

    /// Changes the octave. The base pitch is kept, so the playback rate moves.
    pub fn set_octave(&mut self, octave: Octave) {
        self.octave = octave;
        self.apply_rate();
    }

    /// Moves the pitch fader. Quantized tunings snap the value down to a scale step,
    /// otherwise the value is used as the base pitch directly.
    pub fn set_pitch_fader(&mut self, value: f64, tunings: &TuningTable) -> Result<(), Error> {
        match tunings.resolve(&self.tuning) {
            Some(scale) => {
                let step = scale.quantize(value)?;
                debug!(
                    scale = scale.name(),
                    value,
                    ratio = step.ratio,
                    "Pitch fader quantized"
                );
                self.step = Some(step);
                self.base_pitch = step.ratio;
            }
            None => {
                if !value.is_finite() || value <= 0.0 {
                    return Err(Error::invalid("fader value", value, "must be positive"));
                }
                self.step = None;
                self.base_pitch = self.bound_base_pitch(value);
            }
        }
        self.fader = value;
        self.apply_rate();
        Ok(())
    }

    /// The exact label of the current scale step, if the voice is quantized.
    pub fn fraction_label(&self, tunings: &TuningTable) -> Option<Fraction> {
        let scale = tunings.resolve(&self.tuning)?;
        let step = self.step?;
        scale.step_label(&step).ok()
    }

    /// Sets the attack time. Only used by looping playback.
    pub fn set_attack(&mut self, secs: f64) -> Result<(), Error> {
        self.attack = validate_envelope("attack", secs)?;
        Ok(())
    }

    /// Sets the release time. Only used by looping playback.
    pub fn set_release(&mut self, secs: f64) -> Result<(), Error> {
        self.release = validate_envelope("release", secs)?;
        Ok(())
    }

    /// Changes the trigger mode. Sounding instances are left alone, the new mode
    /// applies from the next press.
    pub fn set_trigger_mode(&mut self, mode: TriggerMode) {
        self.trigger_mode = mode;
    }

    pub fn set_randomize(&mut self, randomize: bool) {
        self.randomize = randomize;
    }

    /// Changes the tuning. The current pitch is kept until the fader next moves.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.tuning = tuning;
        self.step = None;
    }

    /// Replaces the sample. Anything still sounding from the old sample is cut first.
    pub fn set_buffer(&mut self, buffer: SampleBuffer) {
        self.stop_all();
        debug!(sample = buffer.name(), "Voice sample replaced");
        self.buffer = Some(buffer);
    }

    /// Removes the sample, cutting anything still sounding.
    pub fn clear_buffer(&mut self) {
        self.stop_all();
        self.buffer = None;
    }

    /// Starts a playback instance at the given rate.
    pub fn start_playback(
        &mut self,
        rate: f64,
        style: PlaybackStyle,
    ) -> Result<PlaybackId, Error> {
        let buffer = self.buffer.clone().ok_or(Error::MissingBuffer)?;

        let (looped, attack) = match style {
            PlaybackStyle::Looped { attack } => (true, Some(attack)),
            PlaybackStyle::OneShot => (false, None),
        };

        // Only one loop per voice.
        if looped {
            if let Some(previous) = self.loop_instance.take() {
                self.output.stop(previous, None);
                self.instances.retain(|id| *id != previous);
            }
        }

        let id = self
            .output
            .start(PlaybackRequest {
                buffer,
                rate: sanitize_rate(rate),
                volume_db: self.volume,
                looped,
                attack,
            })
            .map_err(|e| Error::Output(e.to_string()))?;

        self.instances.push(id);
        if looped {
            self.loop_instance = Some(id);
        }
        Ok(id)
    }

    /// Releases the looping instance with the release ramp. The ramp continues in the
    /// output after this returns, and the voice keeps track of it until the output
    /// reports it finished. Returns false if nothing was looping.
    pub fn stop_playback(&mut self) -> bool {
        match self.loop_instance.take() {
            Some(id) => {
                self.output
                    .stop(id, Some(Duration::from_secs_f64(self.release)));
                self.instances.retain(|instance| *instance != id);
                self.releasing.push(id);
                true
            }
            None => false,
        }
    }

    /// Cuts every sounding instance without a release ramp, including released loops
    /// that are still fading out.
    pub fn stop_all(&mut self) {
        for id in self.instances.drain(..).chain(self.releasing.drain(..)) {
            self.output.stop(id, None);
        }
        self.loop_instance = None;
    }

    /// Forgets an instance the output reported as finished.
    pub(crate) fn finish_instance(&mut self, id: PlaybackId) -> bool {
        let before = self.instances.len() + self.releasing.len();
        self.instances.retain(|instance| *instance != id);
        self.releasing.retain(|instance| *instance != id);
        if self.loop_instance == Some(id) {
            self.loop_instance = None;
        }
        self.instances.len() + self.releasing.len() != before
    }

    /// Pushes the current rate to the looping instance, if any.
    fn apply_rate(&self) {
        if let Some(id) = self.loop_instance {
            self.output.set_rate(id, self.playback_rate());
        }
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("sample", &self.buffer_name())
            .field("playback_rate", &self.playback_rate())
            .field("octave", &self.octave)
            .field("volume", &self.volume)
            .field("trigger_mode", &self.trigger_mode)
            .field("tuning", &self.tuning)
            .field("instances", &self.instances.len())
            .field("releasing", &self.releasing.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{self, OutputEvent};

    fn make_voice() -> (Voice, Arc<mock::Output>) {
        let (output, _completions) = mock::Output::new("mock-voice");
        let output = Arc::new(output);
        let buffer = SampleBuffer::new("kick", vec![0.0; 16], 1, 44100);
        (Voice::with_buffer(output.clone(), buffer), output)
    }

    #[test]
    fn test_octave_factoring() {
        let (mut voice, _output) = make_voice();
        let tunings = TuningTable::builtin();

        voice.set_octave(Octave::Up);
        voice.set_pitch_fader(1.2, &tunings).unwrap();
        assert!((voice.base_pitch() - 1.2).abs() < 1e-12);
        assert!((voice.playback_rate() - 2.4).abs() < 1e-12);

        // Any sequence of octave and rate changes keeps base * octave == rate.
        let changes: [(Option<Octave>, Option<f64>); 5] = [
            (Some(Octave::Down), None),
            (None, Some(0.8)),
            (Some(Octave::UpTwo), None),
            (None, Some(3.3)),
            (Some(Octave::Unison), None),
        ];
        for (octave, rate) in changes {
            if let Some(octave) = octave {
                voice.set_octave(octave);
            }
            if let Some(rate) = rate {
                voice.set_playback_rate(rate);
                assert!((voice.playback_rate() - rate).abs() < 1e-12);
            }
            assert!(
                (voice.base_pitch() * voice.octave().factor() - voice.playback_rate()).abs()
                    < 1e-12
            );
        }
    }

    #[test]
    fn test_quantized_fader() {
        let (mut voice, _output) = make_voice();
        let tunings = TuningTable::builtin();
        voice.set_tuning(Tuning::Scale("just_fifths".to_string()));

        voice.set_pitch_fader(1.6, &tunings).unwrap();
        assert_eq!(voice.base_pitch(), 1.5);
        assert_eq!(voice.fraction_label(&tunings).unwrap().to_string(), "3/2");

        voice.set_pitch_fader(1.4, &tunings).unwrap();
        assert_eq!(voice.base_pitch(), 1.0);
        assert_eq!(voice.fraction_label(&tunings).unwrap().to_string(), "1/1");

        // Out of the scale's domain: rejected and nothing changes.
        assert!(voice.set_pitch_fader(0.9, &tunings).is_err());
        assert_eq!(voice.base_pitch(), 1.0);
        assert_eq!(voice.fader(), 1.4);
    }

    #[test]
    fn test_unquantized_fader_has_no_label() {
        let (mut voice, _output) = make_voice();
        let tunings = TuningTable::builtin();

        voice.set_pitch_fader(1.37, &tunings).unwrap();
        assert_eq!(voice.base_pitch(), 1.37);
        assert!(voice.fraction_label(&tunings).is_none());
        assert!(voice.set_pitch_fader(-1.0, &tunings).is_err());
    }

    #[test]
    fn test_rate_and_volume_are_clamped() {
        let (mut voice, _output) = make_voice();

        voice.set_playback_rate(-3.0);
        assert_eq!(voice.playback_rate(), DEFAULT_PLAYBACK_RATE);
        voice.set_playback_rate(f64::NAN);
        assert_eq!(voice.playback_rate(), DEFAULT_PLAYBACK_RATE);
        voice.set_playback_rate(100.0);
        assert_eq!(voice.playback_rate(), MAX_PLAYBACK_RATE);

        voice.set_volume(35.0);
        assert_eq!(voice.volume(), MAX_VOLUME_DB);
        voice.set_volume(-90.0);
        assert_eq!(voice.volume(), MIN_VOLUME_DB);
        voice.set_volume(f64::INFINITY);
        assert_eq!(voice.volume(), 0.0);
    }

    #[test]
    fn test_envelope_is_validated() {
        let (mut voice, _output) = make_voice();

        assert!(voice.set_attack(0.5).is_ok());
        assert!(voice.set_release(1.0).is_ok());
        assert!(matches!(
            voice.set_attack(0.0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(voice.set_release(1.5).is_err());
        assert!(voice.set_attack(f64::NAN).is_err());
        assert_eq!(voice.attack(), 0.5);
        assert_eq!(voice.release(), 1.0);
    }

    #[test]
    fn test_loop_rate_change_glides() {
        let (mut voice, output) = make_voice();
        let id = voice
            .start_playback(
                1.0,
                PlaybackStyle::Looped {
                    attack: Duration::from_millis(100),
                },
            )
            .unwrap();
        assert!(voice.is_playing());

        voice.set_playback_rate(1.5);
        assert!(output
            .events()
            .contains(&OutputEvent::RateChanged { id, rate: 1.5 }));
        // No retrigger.
        assert_eq!(output.started().len(), 1);
    }

    #[test]
    fn test_rate_change_is_latent_when_idle() {
        let (mut voice, output) = make_voice();
        voice.set_playback_rate(1.5);
        voice.set_octave(Octave::Up);
        assert!(output.events().is_empty());
    }

    #[test]
    fn test_stop_playback_uses_release() {
        let (mut voice, output) = make_voice();
        voice.set_release(0.25).unwrap();
        let id = voice
            .start_playback(
                1.0,
                PlaybackStyle::Looped {
                    attack: Duration::from_millis(100),
                },
            )
            .unwrap();

        assert!(voice.stop_playback());
        assert!(!voice.is_playing());
        assert!(!voice.is_sounding());
        assert_eq!(
            output.events().last(),
            Some(&OutputEvent::Stopped {
                id,
                release: Some(Duration::from_millis(250))
            })
        );
        assert!(!voice.stop_playback());
    }

    #[test]
    fn test_stop_all_cuts_release_tail() {
        let (mut voice, output) = make_voice();
        let id = voice
            .start_playback(
                1.0,
                PlaybackStyle::Looped {
                    attack: Duration::from_millis(100),
                },
            )
            .unwrap();

        assert!(voice.stop_playback());
        assert!(!voice.is_sounding());
        assert!(voice.is_releasing());
        assert!(voice.owns(id));

        voice.stop_all();
        assert!(!voice.is_releasing());
        assert!(!voice.owns(id));
        assert_eq!(
            output.events().last(),
            Some(&OutputEvent::Stopped { id, release: None })
        );
    }

    #[test]
    fn test_finished_release_is_forgotten() {
        let (mut voice, _output) = make_voice();
        let id = voice
            .start_playback(
                1.0,
                PlaybackStyle::Looped {
                    attack: Duration::from_millis(100),
                },
            )
            .unwrap();
        voice.stop_playback();

        assert!(voice.finish_instance(id));
        assert!(!voice.is_releasing());
        assert!(!voice.finish_instance(id));
    }

    #[test]
    fn test_direct_pitch_leaves_scale_step() {
        let (mut voice, _output) = make_voice();
        let tunings = TuningTable::builtin();
        voice.set_tuning(Tuning::Scale("just_fifths".to_string()));
        voice.set_pitch_fader(1.6, &tunings).unwrap();
        assert!(voice.fraction_label(&tunings).is_some());

        voice.set_playback_rate(3.0);
        assert!(voice.step().is_none());
        assert!(voice.fraction_label(&tunings).is_none());
        assert_eq!(voice.base_pitch(), 3.0);

        voice.set_pitch_fader(1.6, &tunings).unwrap();
        voice.set_base_pitch(1.25);
        assert!(voice.fraction_label(&tunings).is_none());
    }

    #[test]
    fn test_rate_stays_in_range_with_octave() {
        let (mut voice, output) = make_voice();
        let tunings = TuningTable::builtin();

        voice.set_octave(Octave::UpTwo);
        voice.set_base_pitch(10.0);
        assert_eq!(voice.base_pitch(), MAX_PLAYBACK_RATE / 4.0);
        assert_eq!(voice.playback_rate(), MAX_PLAYBACK_RATE);

        voice.set_pitch_fader(12.0, &tunings).unwrap();
        assert_eq!(voice.playback_rate(), MAX_PLAYBACK_RATE);

        // Raising the octave keeps the base pitch but never reports more than plays.
        voice.set_octave(Octave::Unison);
        voice.set_base_pitch(16.0);
        voice.set_octave(Octave::Up);
        assert_eq!(voice.base_pitch(), 16.0);
        assert_eq!(voice.playback_rate(), MAX_PLAYBACK_RATE);

        voice
            .start_playback(voice.playback_rate(), PlaybackStyle::OneShot)
            .unwrap();
        match output.events().last() {
            Some(OutputEvent::Started { rate, .. }) => assert_eq!(*rate, voice.playback_rate()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_set_buffer_stops_old_sample() {
        let (mut voice, output) = make_voice();
        let first = voice.start_playback(1.0, PlaybackStyle::OneShot).unwrap();
        let second = voice.start_playback(1.0, PlaybackStyle::OneShot).unwrap();
        assert_eq!(voice.instance_count(), 2);

        voice.set_buffer(SampleBuffer::new("snare", vec![0.0; 8], 1, 44100));
        assert_eq!(voice.buffer_name(), Some("snare"));
        assert!(!voice.is_sounding());
        assert!(!output.is_active(first));
        assert!(!output.is_active(second));
    }

    #[test]
    fn test_missing_buffer() {
        let (output, _completions) = mock::Output::new("mock-voice");
        let mut voice = Voice::new(Arc::new(output));
        assert!(matches!(
            voice.start_playback(1.0, PlaybackStyle::OneShot),
            Err(Error::MissingBuffer)
        ));
    }

    #[test]
    fn test_volume_applies_to_sounding_instances() {
        let (mut voice, output) = make_voice();
        let id = voice.start_playback(1.0, PlaybackStyle::OneShot).unwrap();
        voice.set_volume(-6.0);
        assert!(output.events().contains(&OutputEvent::VolumeChanged {
            id,
            volume_db: -6.0
        }));
    }

    #[test]
    fn test_duplicate_shares_sample_not_instances() {
        let (mut voice, _output) = make_voice();
        voice.set_octave(Octave::Down);
        voice.set_trigger_mode(TriggerMode::Rapid);
        voice.start_playback(1.0, PlaybackStyle::OneShot).unwrap();

        let copy = voice.duplicate();
        assert_eq!(copy.octave(), Octave::Down);
        assert_eq!(copy.trigger_mode(), TriggerMode::Rapid);
        assert!(copy.buffer().unwrap().same_data(voice.buffer().unwrap()));
        assert!(!copy.is_sounding());
    }

    #[test]
    fn test_octave_from_number() {
        assert_eq!(Octave::try_from(0.5).unwrap(), Octave::Down);
        assert_eq!(Octave::try_from(4.0).unwrap(), Octave::UpTwo);
        assert!(Octave::try_from(3.0).is_err());
        assert_eq!(f64::from(Octave::Up), 2.0);
    }
}
