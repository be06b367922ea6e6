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

//! Scales and pitch-fader quantization.
//!
//! A scale is one octave of ratios in [1, 2). Quantization always rounds down to the
//! greatest step that does not exceed the fader value.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::Error;

/// Returned by quantization when no step of the scale is at or below the value.
pub const OCTAVE_BOUNDARY: f64 = 2.0;

/// An exact ratio used to label a scale step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fraction {
    numerator: u32,
    denominator: u32,
}

impl Fraction {
    /// Creates a new fraction. Both parts must be non-zero.
    pub fn new(numerator: u32, denominator: u32) -> Result<Fraction, Error> {
        if numerator == 0 {
            return Err(Error::invalid(
                "numerator",
                numerator as f64,
                "must be positive",
            ));
        }
        if denominator == 0 {
            return Err(Error::invalid(
                "denominator",
                denominator as f64,
                "must be positive",
            ));
        }
        Ok(Fraction {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// The ratio as a float.
    pub fn ratio(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Fraction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (numerator, denominator) = s
            .split_once('/')
            .ok_or_else(|| format!("fraction {} must be in the form n/d", s))?;
        let numerator: u32 = numerator
            .trim()
            .parse()
            .map_err(|e| format!("bad numerator in {}: {}", s, e))?;
        let denominator: u32 = denominator
            .trim()
            .parse()
            .map_err(|e| format!("bad denominator in {}: {}", s, e))?;
        Fraction::new(numerator, denominator).map_err(|e| e.to_string())
    }
}

/// The result of quantizing a fader value against a scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    /// The selected ratio.
    pub ratio: f64,
    /// Position of the ratio in the scale, or None for the octave boundary fallback.
    pub index: Option<usize>,
}

/// One octave of a tuning system.
#[derive(Clone, Debug, PartialEq)]
pub struct Scale {
    name: String,
    ratios: Vec<f64>,
    fractions: Vec<Fraction>,
}

impl Scale {
    /// Builds a scale from its fraction labels. Ratios are derived from the fractions,
    /// so both sequences always agree. Steps must be strictly ascending within [1, 2).
    pub fn new(name: &str, fractions: Vec<Fraction>) -> Result<Scale, Error> {
        let ratios: Vec<f64> = fractions.iter().map(Fraction::ratio).collect();

        for ratio in ratios.iter() {
            if !(1.0..OCTAVE_BOUNDARY).contains(ratio) {
                return Err(Error::invalid(
                    "scale step",
                    *ratio,
                    "must lie within one octave [1, 2)",
                ));
            }
        }
        if let Some(pair) = ratios.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(Error::invalid(
                "scale step",
                pair[1],
                "steps must be strictly ascending",
            ));
        }

        Ok(Scale {
            name: name.to_string(),
            ratios,
            fractions,
        })
    }

    /// Parses a scale from `n/d` strings.
    pub fn parse(name: &str, steps: &[String]) -> Result<Scale, String> {
        let fractions = steps
            .iter()
            .map(|step| step.parse::<Fraction>())
            .collect::<Result<Vec<Fraction>, String>>()
            .map_err(|e| format!("scale {}: {}", name, e))?;
        Scale::new(name, fractions).map_err(|e| format!("scale {}: {}", name, e))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    pub fn fractions(&self) -> &[Fraction] {
        &self.fractions
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// Returns the greatest ratio in the scale that is less than or equal to `value`.
    /// Never rounds up or to nearest. Falls back to the octave boundary if every step
    /// is above the value.
    pub fn quantize(&self, value: f64) -> Result<Step, Error> {
        if !value.is_finite() || !(1.0..OCTAVE_BOUNDARY).contains(&value) {
            return Err(Error::invalid(
                "fader value",
                value,
                "must lie within one octave [1, 2)",
            ));
        }

        // Ratios ascend, so the floor is the last step not above the value.
        let step = match self.ratios.iter().rposition(|ratio| *ratio <= value) {
            Some(index) => Step {
                ratio: self.ratios[index],
                index: Some(index),
            },
            None => Step {
                ratio: OCTAVE_BOUNDARY,
                index: None,
            },
        };
        Ok(step)
    }

    /// Returns the label for the step at `index`.
    pub fn display_fraction(&self, index: usize) -> Result<Fraction, Error> {
        self.fractions
            .get(index)
            .copied()
            .ok_or_else(|| Error::invalid("scale index", index as f64, "no such step in scale"))
    }

    /// Returns the label for a quantized step, including the octave boundary.
    pub fn step_label(&self, step: &Step) -> Result<Fraction, Error> {
        match step.index {
            Some(index) => self.display_fraction(index),
            None => Fraction::new(2, 1),
        }
    }
}

/// How a voice maps its pitch fader onto a base pitch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Tuning {
    /// The raw fader value is the base pitch.
    #[default]
    Unquantized,
    /// The fader snaps down to steps of the named scale.
    Scale(String),
}

impl Tuning {
    /// Name used for the unquantized tuning in configuration files.
    pub const UNQUANTIZED: &'static str = "unquantized";

    /// Maps a configured tuning name onto a tuning. A missing name, an empty name
    /// or the unquantized name all mean unquantized.
    pub fn from_name(name: Option<&str>) -> Tuning {
        match name.map(str::trim) {
            None | Some("") | Some(Tuning::UNQUANTIZED) => Tuning::Unquantized,
            Some(name) => Tuning::Scale(name.to_string()),
        }
    }

    /// The configured name of this tuning, None when unquantized.
    pub fn name(&self) -> Option<&str> {
        match self {
            Tuning::Unquantized => None,
            Tuning::Scale(name) => Some(name),
        }
    }
}

impl fmt::Display for Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tuning::Unquantized => write!(f, "{}", Tuning::UNQUANTIZED),
            Tuning::Scale(name) => write!(f, "{}", name),
        }
    }
}

/// All scales known to an instrument, by name.
#[derive(Clone, Debug)]
pub struct TuningTable {
    scales: BTreeMap<String, Scale>,
}

impl TuningTable {
    /// Creates a table without any scales.
    pub fn empty() -> TuningTable {
        TuningTable {
            scales: BTreeMap::new(),
        }
    }

    /// Creates a table holding the built-in scales.
    pub fn builtin() -> TuningTable {
        let mut table = TuningTable::empty();
        for (name, steps) in BUILTIN_SCALES {
            let fractions = steps
                .iter()
                .map(|(n, d)| Fraction {
                    numerator: *n,
                    denominator: *d,
                })
                .collect();
            // Built-in definitions are ascending within the octave.
            if let Ok(scale) = Scale::new(name, fractions) {
                table.insert(scale);
            }
        }
        table
    }

    /// Adds a scale, replacing any scale with the same name.
    pub fn insert(&mut self, scale: Scale) {
        if let Some(previous) = self.scales.insert(scale.name.clone(), scale) {
            debug!(scale = previous.name, "Scale replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scale> {
        self.scales.get(name)
    }

    /// Scale names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scales.keys().map(String::as_str)
    }

    /// Resolves a tuning to the scale that quantizes it. Unknown names and empty
    /// scales resolve to None, which callers treat as unquantized.
    pub fn resolve(&self, tuning: &Tuning) -> Option<&Scale> {
        match tuning {
            Tuning::Unquantized => None,
            Tuning::Scale(name) => match self.scales.get(name) {
                Some(scale) if scale.is_empty() => None,
                Some(scale) => Some(scale),
                None => {
                    warn!(scale = name, "Unknown scale, treating as unquantized");
                    None
                }
            },
        }
    }
}

impl Default for TuningTable {
    fn default() -> Self {
        TuningTable::builtin()
    }
}

type BuiltinScale = (&'static str, &'static [(u32, u32)]);

const BUILTIN_SCALES: &[BuiltinScale] = &[
    ("just_fifths", &[(1, 1), (3, 2)]),
    (
        "just_major",
        &[(1, 1), (9, 8), (5, 4), (4, 3), (3, 2), (5, 3), (15, 8)],
    ),
    ("just_pentatonic", &[(1, 1), (9, 8), (5, 4), (3, 2), (5, 3)]),
    (
        "just_chromatic",
        &[
            (1, 1),
            (16, 15),
            (9, 8),
            (6, 5),
            (5, 4),
            (4, 3),
            (45, 32),
            (3, 2),
            (8, 5),
            (5, 3),
            (9, 5),
            (15, 8),
        ],
    ),
    (
        "pythagorean",
        &[
            (1, 1),
            (256, 243),
            (9, 8),
            (32, 27),
            (81, 64),
            (4, 3),
            (729, 512),
            (3, 2),
            (128, 81),
            (27, 16),
            (16, 9),
            (243, 128),
        ],
    ),
    (
        "harmonic",
        &[
            (1, 1),
            (9, 8),
            (5, 4),
            (11, 8),
            (3, 2),
            (13, 8),
            (7, 4),
            (15, 8),
        ],
    ),
];
