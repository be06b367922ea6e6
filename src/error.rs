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

/// Errors raised by the voice engine and its configuration mutators.
///
/// None of these are fatal to the engine as a whole. Callers are expected to treat
/// `UnboundKey` and `MissingBuffer` as "nothing to play".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no voice is bound to key {0}")]
    UnboundKey(String),

    #[error("invalid {parameter} {value}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("voice has no sample assigned")]
    MissingBuffer,

    #[error("no keyboard named {0}")]
    UnknownKeyboard(String),

    #[error("a keyboard named {0} already exists")]
    DuplicateKeyboard(String),

    #[error("keyboard {0} is the current keyboard")]
    KeyboardInUse(String),

    #[error("output rejected playback: {0}")]
    Output(String),
}

impl Error {
    /// Shorthand for building an `InvalidParameter` error.
    pub(crate) fn invalid(parameter: &'static str, value: f64, reason: &'static str) -> Error {
        Error::InvalidParameter {
            parameter,
            value,
            reason,
        }
    }
}
