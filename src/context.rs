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

//! The instrument state shared by the engine and its collaborators.
//!
//! Each field has a single owner allowed to change it:
//! - the buffer library is filled by the audio source provider,
//! - the tuning table is filled when the instrument is configured,
//! - keyboards are created, renamed, copied and removed by the presentation layer,
//! - which keyboard is current is only ever changed by the trigger engine, so that
//!   outgoing voices are silenced first.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::audio::{BufferLibrary, Output, PlaybackId};
use crate::error::Error;
use crate::keymap::{Key, KeyMap};
use crate::tuning::TuningTable;
use crate::voice::Voice;

pub struct Context {
    output: Arc<dyn Output>,
    buffers: BufferLibrary,
    tunings: TuningTable,
    /// Keyboards in the order they were added.
    keyboards: Vec<KeyMap>,
    /// Index of the current keyboard.
    current: usize,
}

impl Context {
    /// Creates a context whose current keyboard is `keyboard`.
    pub fn new(
        output: Arc<dyn Output>,
        buffers: BufferLibrary,
        tunings: TuningTable,
        keyboard: KeyMap,
    ) -> Context {
        Context {
            output,
            buffers,
            tunings,
            keyboards: vec![keyboard],
            current: 0,
        }
    }

    /// The output new voices should be created on.
    pub fn output(&self) -> Arc<dyn Output> {
        self.output.clone()
    }

    pub fn buffers(&self) -> &BufferLibrary {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferLibrary {
        &mut self.buffers
    }

    pub fn tunings(&self) -> &TuningTable {
        &self.tunings
    }

    pub fn tunings_mut(&mut self) -> &mut TuningTable {
        &mut self.tunings
    }

    /// Keyboard names in the order they were added.
    pub fn keyboard_names(&self) -> Vec<&str> {
        self.keyboards.iter().map(KeyMap::name).collect()
    }

    pub fn keyboard(&self, name: &str) -> Result<&KeyMap, Error> {
        let index = self.keyboard_index(name)?;
        Ok(&self.keyboards[index])
    }

    pub fn keyboard_mut(&mut self, name: &str) -> Result<&mut KeyMap, Error> {
        let index = self.keyboard_index(name)?;
        Ok(&mut self.keyboards[index])
    }

    pub fn current_keyboard(&self) -> &KeyMap {
        &self.keyboards[self.current]
    }

    /// The current keyboard, for editing its voices.
    pub fn current_keyboard_mut(&mut self) -> &mut KeyMap {
        &mut self.keyboards[self.current]
    }

    pub fn current_keyboard_name(&self) -> &str {
        self.current_keyboard().name()
    }

    /// Looks up a voice on the current keyboard.
    pub fn voice(&self, key: &Key) -> Result<&Voice, Error> {
        self.current_keyboard().get_voice(key)
    }

    /// Looks up a voice on the current keyboard for editing.
    pub fn voice_mut(&mut self, key: &Key) -> Result<&mut Voice, Error> {
        self.current_keyboard_mut().get_voice_mut(key)
    }

    /// Adds a keyboard. Names must be unique.
    pub fn add_keyboard(&mut self, keyboard: KeyMap) -> Result<(), Error> {
        if self.keyboard_index(keyboard.name()).is_ok() {
            return Err(Error::DuplicateKeyboard(keyboard.name().to_string()));
        }
        info!(keyboard = keyboard.name(), keys = keyboard.len(), "Keyboard added");
        self.keyboards.push(keyboard);
        Ok(())
    }

    /// Adds a keyboard with every default key bound to a sample from the library.
    pub fn add_default_keyboard(&mut self, name: &str) -> Result<(), Error> {
        let keyboard = KeyMap::with_defaults(name, self.output.clone(), &self.buffers);
        self.add_keyboard(keyboard)
    }

    pub fn rename_keyboard(&mut self, name: &str, new_name: &str) -> Result<(), Error> {
        if name == new_name {
            return self.keyboard_index(name).map(|_| ());
        }
        if self.keyboard_index(new_name).is_ok() {
            return Err(Error::DuplicateKeyboard(new_name.to_string()));
        }
        self.keyboard_mut(name)?.rename(new_name);
        Ok(())
    }

    /// Copies a keyboard under a new name.
    pub fn duplicate_keyboard(&mut self, name: &str, new_name: &str) -> Result<(), Error> {
        let copy = self.keyboard(name)?.duplicate(new_name);
        self.add_keyboard(copy)
    }

    /// Removes a keyboard. The current keyboard cannot be removed.
    pub fn remove_keyboard(&mut self, name: &str) -> Result<KeyMap, Error> {
        let index = self.keyboard_index(name)?;
        if index == self.current {
            return Err(Error::KeyboardInUse(name.to_string()));
        }
        let mut keyboard = self.keyboards.remove(index);
        keyboard.stop_all();
        if index < self.current {
            self.current -= 1;
        }
        info!(keyboard = name, "Keyboard removed");
        Ok(keyboard)
    }

    /// Resets a keyboard to default voices using the samples in the library.
    pub fn reset_keyboard(&mut self, name: &str) -> Result<(), Error> {
        let index = self.keyboard_index(name)?;
        self.keyboards[index].replace_with_defaults(self.output.clone(), &self.buffers);
        Ok(())
    }

    pub(crate) fn keyboard_index(&self, name: &str) -> Result<usize, Error> {
        self.keyboards
            .iter()
            .position(|keyboard| keyboard.name() == name)
            .ok_or_else(|| Error::UnknownKeyboard(name.to_string()))
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current
    }

    pub(crate) fn set_current(&mut self, index: usize) {
        self.current = index;
    }

    /// Finds the voice on any keyboard that started the given instance.
    pub(crate) fn instance_owner_mut(&mut self, id: PlaybackId) -> Option<(&Key, &mut Voice)> {
        self.keyboards
            .iter_mut()
            .find_map(|keyboard| keyboard.instance_owner_mut(id))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("output", &self.output.to_string())
            .field("buffers", &self.buffers.len())
            .field("keyboards", &self.keyboard_names())
            .field("current", &self.current_keyboard_name())
            .finish()
    }
}
