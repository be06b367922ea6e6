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

//! A computer-keyboard sample instrument. Keys are bound to voices, each playing a
//! sample with its own pitch, envelope, trigger mode and tuning.

pub mod audio;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod keymap;
pub mod tuning;
pub mod voice;

pub use crate::context::Context;
pub use crate::engine::{KeyEvent, KeyOutcome, RandomPitch, TriggerEngine, TriggerState};
pub use crate::error::Error;
pub use crate::keymap::{Key, KeyMap};
pub use crate::tuning::{Fraction, Scale, Step, Tuning, TuningTable};
pub use crate::voice::{Octave, TriggerMode, Voice};
