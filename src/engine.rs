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

//! Trigger engine that turns key events into voice playback.
//!
//! A key is sounding while its voice has at least one live playback instance. What
//! a key-down does depends on the voice's trigger mode at the time of the press:
//! - LOOP starts a looped instance unless one is already looping,
//! - SINGLE starts a one-shot unless anything is still sounding,
//! - RAPID always starts another overlapping one-shot.
//!
//! A key-up releases a looping instance and does nothing else. Changing a voice's
//! mode never interrupts what is sounding; the new mode applies from the next press.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::audio::PlaybackId;
use crate::context::Context;
use crate::error::Error;
use crate::keymap::Key;
use crate::voice::{PlaybackStyle, TriggerMode, Voice};

/// Default lower bound of randomized pitch: one octave down.
pub const DEFAULT_RANDOM_PITCH_MIN: f64 = 0.5;

/// Default upper bound of randomized pitch: one octave up.
pub const DEFAULT_RANDOM_PITCH_MAX: f64 = 2.0;

/// A key event from the input collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Down(Key),
    Up(Key),
}

impl KeyEvent {
    pub fn key(&self) -> &Key {
        match self {
            KeyEvent::Down(key) | KeyEvent::Up(key) => key,
        }
    }
}

/// Whether a key currently has anything sounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Sounding,
}

/// What handling a key event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// A new playback instance was started.
    Started(PlaybackId),
    /// A looping instance was released.
    Released,
    /// The event had no effect in the voice's current state.
    Ignored,
    /// The voice has no sample, so nothing was played.
    Silent,
}

/// The range randomized voices draw their pitch from. Pitches are drawn uniformly in
/// octaves, so a range of 0.5 to 2.0 is as likely to go down as up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomPitch {
    min: f64,
    max: f64,
}

impl RandomPitch {
    pub fn new(min: f64, max: f64) -> Result<RandomPitch, Error> {
        if !min.is_finite() || min <= 0.0 {
            return Err(Error::invalid("random pitch minimum", min, "must be positive"));
        }
        if !max.is_finite() || max < min {
            return Err(Error::invalid(
                "random pitch maximum",
                max,
                "must not be below the minimum",
            ));
        }
        Ok(RandomPitch { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Draws a pitch multiplier within the range.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.min == self.max {
            return self.min;
        }
        let octaves = rng.gen_range(self.min.log2()..=self.max.log2());
        octaves.exp2().clamp(self.min, self.max)
    }
}

impl Default for RandomPitch {
    fn default() -> Self {
        RandomPitch {
            min: DEFAULT_RANDOM_PITCH_MIN,
            max: DEFAULT_RANDOM_PITCH_MAX,
        }
    }
}

/// Drives voices on the current keyboard from key events.
pub struct TriggerEngine {
    /// Finished playback instances reported by the output.
    completions: Receiver<PlaybackId>,
    random_pitch: RandomPitch,
    rng: StdRng,
}

impl TriggerEngine {
    /// Creates a new trigger engine reading completions from the output's channel.
    pub fn new(completions: Receiver<PlaybackId>, random_pitch: RandomPitch) -> TriggerEngine {
        TriggerEngine {
            completions,
            random_pitch,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a trigger engine whose pitch randomization is reproducible.
    pub fn with_seed(
        completions: Receiver<PlaybackId>,
        random_pitch: RandomPitch,
        seed: u64,
    ) -> TriggerEngine {
        TriggerEngine {
            completions,
            random_pitch,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn random_pitch(&self) -> RandomPitch {
        self.random_pitch
    }

    pub fn set_random_pitch(&mut self, random_pitch: RandomPitch) {
        self.random_pitch = random_pitch;
    }

    /// Handles a batch of key events. Pending completions are applied before any
    /// event, and a failing key never prevents the rest of the batch from running.
    pub fn dispatch(
        &mut self,
        context: &mut Context,
        events: &[KeyEvent],
    ) -> Vec<Result<KeyOutcome, Error>> {
        self.poll_completions(context);

        events
            .iter()
            .map(|event| {
                let result = match event {
                    KeyEvent::Down(key) => self.key_down(context, key),
                    KeyEvent::Up(key) => self.key_up(context, key),
                };
                match &result {
                    Err(Error::UnboundKey(_)) => {
                        debug!(key = %event.key(), "Key not bound, nothing to play")
                    }
                    Err(e) => warn!(key = %event.key(), error = %e, "Key event failed"),
                    Ok(_) => {}
                }
                result
            })
            .collect()
    }

    /// Handles a key press on the current keyboard.
    pub fn key_down(&mut self, context: &mut Context, key: &Key) -> Result<KeyOutcome, Error> {
        // A completion for this key that is already pending must land first, or a
        // re-press right after a one-shot ends would be dropped.
        self.poll_completions(context);

        let voice = context.voice_mut(key)?;
        let outcome = match voice.trigger_mode() {
            TriggerMode::Loop => self.loop_down(voice),
            TriggerMode::Single => self.single_down(voice),
            TriggerMode::Rapid => self.rapid_down(voice),
        }?;

        match outcome {
            KeyOutcome::Started(id) => debug!(
                %key,
                mode = %voice.trigger_mode(),
                rate = voice.playback_rate(),
                %id,
                "Voice triggered"
            ),
            KeyOutcome::Silent => debug!(%key, "Voice has no sample"),
            _ => {}
        }
        Ok(outcome)
    }

    /// Handles a key release on the current keyboard.
    pub fn key_up(&mut self, context: &mut Context, key: &Key) -> Result<KeyOutcome, Error> {
        let voice = context.voice_mut(key)?;

        // Only loops respond to release. This is checked on the voice rather than its
        // mode, so a loop started before a mode change is still released.
        if voice.stop_playback() {
            debug!(%key, release = voice.release(), "Voice released");
            return Ok(KeyOutcome::Released);
        }
        Ok(KeyOutcome::Ignored)
    }

    fn loop_down(&mut self, voice: &mut Voice) -> Result<KeyOutcome, Error> {
        if voice.is_playing() {
            return Ok(KeyOutcome::Ignored);
        }
        let attack = Duration::from_secs_f64(voice.attack());
        self.start(voice, PlaybackStyle::Looped { attack })
    }

    fn single_down(&mut self, voice: &mut Voice) -> Result<KeyOutcome, Error> {
        if voice.is_sounding() {
            return Ok(KeyOutcome::Ignored);
        }
        self.start(voice, PlaybackStyle::OneShot)
    }

    fn rapid_down(&mut self, voice: &mut Voice) -> Result<KeyOutcome, Error> {
        self.start(voice, PlaybackStyle::OneShot)
    }

    fn start(&mut self, voice: &mut Voice, style: PlaybackStyle) -> Result<KeyOutcome, Error> {
        let rate = self.resolve_rate(voice);
        match voice.start_playback(rate, style) {
            Ok(id) => Ok(KeyOutcome::Started(id)),
            Err(Error::MissingBuffer) => Ok(KeyOutcome::Silent),
            Err(e) => Err(e),
        }
    }

    /// Works out the rate to trigger a voice at. Randomized voices draw a new base
    /// pitch on every trigger. Quantized voices already hold a quantized base pitch.
    fn resolve_rate(&mut self, voice: &mut Voice) -> f64 {
        if voice.randomize() {
            // Only the new instance takes the drawn pitch. A loop held from before a
            // mode change keeps playing at its own rate.
            let pitch = self.random_pitch.sample(&mut self.rng);
            voice.store_base_pitch(pitch);
        }
        voice.playback_rate()
    }

    /// Applies every completion the output has reported so far. Returns how many
    /// instances were finished.
    pub fn poll_completions(&mut self, context: &mut Context) -> usize {
        let mut finished = 0;
        while let Ok(id) = self.completions.try_recv() {
            // Instances cut by configuration changes are no longer owned by any voice.
            if let Some((key, voice)) = context.instance_owner_mut(id) {
                voice.finish_instance(id);
                finished += 1;
                debug!(%key, %id, remaining = voice.instance_count(), "Playback completed");
            }
        }
        finished
    }

    /// Makes another keyboard current. Everything sounding on the outgoing keyboard
    /// is cut before the new keyboard can be triggered.
    pub fn switch_keyboard(&mut self, context: &mut Context, name: &str) -> Result<(), Error> {
        let index = context.keyboard_index(name)?;
        if index == context.current_index() {
            return Ok(());
        }

        let outgoing = context.current_keyboard_name().to_string();
        let stopped = context.current_keyboard_mut().stop_all();
        context.set_current(index);
        self.poll_completions(context);

        info!(from = %outgoing, to = name, stopped, "Keyboard switched");
        Ok(())
    }

    /// Returns whether the key on the current keyboard has anything sounding.
    pub fn trigger_state(&self, context: &Context, key: &Key) -> Result<TriggerState, Error> {
        let voice = context.voice(key)?;
        Ok(if voice.is_sounding() {
            TriggerState::Sounding
        } else {
            TriggerState::Idle
        })
    }

    /// Cuts everything sounding on the current keyboard.
    pub fn stop_all(&mut self, context: &mut Context) {
        let stopped = context.current_keyboard_mut().stop_all();
        if stopped > 0 {
            info!(stopped, "All voices stopped");
        }
    }
}

impl fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("random_pitch", &self.random_pitch)
            .field("pending_completions", &self.completions.len())
            .finish()
    }
}
