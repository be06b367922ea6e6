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

//! Key to voice bindings for one named keyboard.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::{BufferLibrary, Output, PlaybackId};
use crate::error::Error;
use crate::voice::{TriggerMode, Voice};

/// Keys bound by a default keyboard, in binding order.
pub const DEFAULT_KEYS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "q", "w", "e", "r", "t", "y", "u",
    "i", "o", "p", "a", "s", "d", "f", "g", "h", "j", "k", "l", ";", "z", "x", "c", "v",
    "b", "n", "m", ",", ".", "/",
];

/// A key identifier as produced by the input collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Key {
        Key(key.to_string())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Key {
        Key(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One keyboard configuration: a voice per bound key.
pub struct KeyMap {
    name: String,
    voices: BTreeMap<Key, Voice>,
}

impl KeyMap {
    /// Creates a keyboard without any bound keys.
    pub fn new(name: &str) -> KeyMap {
        KeyMap {
            name: name.to_string(),
            voices: BTreeMap::new(),
        }
    }

    /// Creates a keyboard binding every default key to a default voice.
    pub fn with_defaults(name: &str, output: Arc<dyn Output>, buffers: &BufferLibrary) -> KeyMap {
        let mut keymap = KeyMap::new(name);
        keymap.replace_with_defaults(output, buffers);
        keymap
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: &str) {
        info!(from = self.name, to = name, "Keyboard renamed");
        self.name = name.to_string();
    }

    /// Bound keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.voices.keys()
    }

    /// Bound keys with their voices in key order.
    pub fn voices(&self) -> impl Iterator<Item = (&Key, &Voice)> {
        self.voices.iter()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn get_voice(&self, key: &Key) -> Result<&Voice, Error> {
        self.voices
            .get(key)
            .ok_or_else(|| Error::UnboundKey(key.to_string()))
    }

    pub fn get_voice_mut(&mut self, key: &Key) -> Result<&mut Voice, Error> {
        self.voices
            .get_mut(key)
            .ok_or_else(|| Error::UnboundKey(key.to_string()))
    }

    /// Changes the trigger mode of the voice bound to the key.
    pub fn set_trigger_mode(&mut self, mode: TriggerMode, key: &Key) -> Result<(), Error> {
        self.get_voice_mut(key)?.set_trigger_mode(mode);
        debug!(keyboard = self.name, %key, %mode, "Trigger mode changed");
        Ok(())
    }

    /// Binds a voice to a key. A voice previously bound to the key is silenced and
    /// returned.
    pub fn bind(&mut self, key: Key, voice: Voice) -> Option<Voice> {
        let mut previous = self.voices.insert(key, voice);
        if let Some(previous) = previous.as_mut() {
            previous.stop_all();
        }
        previous
    }

    /// Removes the voice bound to the key, silencing it.
    pub fn unbind(&mut self, key: &Key) -> Result<Voice, Error> {
        let mut voice = self
            .voices
            .remove(key)
            .ok_or_else(|| Error::UnboundKey(key.to_string()))?;
        voice.stop_all();
        Ok(voice)
    }

    /// Copies this keyboard under a new name. The copy's voices share samples with
    /// this keyboard but are otherwise independent.
    pub fn duplicate(&self, name: &str) -> KeyMap {
        KeyMap {
            name: name.to_string(),
            voices: self
                .voices
                .iter()
                .map(|(key, voice)| (key.clone(), voice.duplicate()))
                .collect(),
        }
    }

    /// Throws away every binding and binds each default key to a default voice. Samples
    /// are taken from the library in name order, repeating when there are more keys
    /// than samples. Everything sounding is cut first.
    pub fn replace_with_defaults(&mut self, output: Arc<dyn Output>, buffers: &BufferLibrary) {
        self.stop_all();

        let samples: Vec<_> = buffers.buffers().cloned().collect();
        self.voices = DEFAULT_KEYS
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let voice = if samples.is_empty() {
                    Voice::new(output.clone())
                } else {
                    Voice::with_buffer(output.clone(), samples[i % samples.len()].clone())
                };
                (Key::from(*key), voice)
            })
            .collect();

        info!(
            keyboard = self.name,
            keys = self.voices.len(),
            samples = samples.len(),
            "Keyboard reset to defaults"
        );
    }

    /// Cuts every sounding voice on this keyboard, release tails included. Returns
    /// how many voices had anything to cut.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for voice in self.voices.values_mut() {
            if voice.is_sounding() || voice.is_releasing() {
                voice.stop_all();
                stopped += 1;
            }
        }
        stopped
    }

    /// Keys whose voices are currently sounding.
    pub fn sounding_keys(&self) -> Vec<&Key> {
        self.voices
            .iter()
            .filter(|(_, voice)| voice.is_sounding())
            .map(|(key, _)| key)
            .collect()
    }

    /// Finds the voice that started the given playback instance.
    pub(crate) fn instance_owner_mut(&mut self, id: PlaybackId) -> Option<(&Key, &mut Voice)> {
        self.voices.iter_mut().find(|(_, voice)| voice.owns(id))
    }
}

impl fmt::Debug for KeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMap")
            .field("name", &self.name)
            .field("keys", &self.voices.len())
            .field("sounding", &self.sounding_keys().len())
            .finish()
    }
}
