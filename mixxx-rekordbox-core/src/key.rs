//! Musical keys
//!
//! Mixxx stores a `ChromaticKey` id per track; rekordbox takes whatever text
//! is in `Tonality`, so the key is rendered in the notation the user picked.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Notation used for the `Tonality` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyNotation {
    /// Camelot wheel (1A-12B)
    #[default]
    Lancelot,
    /// Open Key (1m-12d)
    OpenKey,
    /// Note names (C, Am)
    Traditional,
}

impl FromStr for KeyNotation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lancelot" | "camelot" => Ok(KeyNotation::Lancelot),
            "openkey" | "open-key" => Ok(KeyNotation::OpenKey),
            "traditional" => Ok(KeyNotation::Traditional),
            _ => Err(Error::UnsupportedKeyNotation(s.to_string())),
        }
    }
}

impl fmt::Display for KeyNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyNotation::Lancelot => "lancelot",
            KeyNotation::OpenKey => "openkey",
            KeyNotation::Traditional => "traditional",
        };
        f.write_str(name)
    }
}

/// Open Key wheel position of each major key, indexed by pitch class.
/// A minor key sits at the position of its relative major.
const OPEN_KEY_WHEEL: [u8; 12] = [1, 8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6];

/// Pitch class names, sharps only
const PITCH_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    /// 0 = C .. 11 = B
    pub pitch_class: u8,
    pub is_major: bool,
}

impl Key {
    pub fn new(pitch_class: u8, is_major: bool) -> Self {
        Self {
            pitch_class: pitch_class % 12,
            is_major,
        }
    }

    /// Mixxx `key_id`: 1..=12 major, 13..=24 minor, both starting at C.
    /// Anything else means no key was detected.
    pub fn from_mixxx_id(id: i64) -> Option<Self> {
        match id {
            1..=12 => Some(Self::new((id - 1) as u8, true)),
            13..=24 => Some(Self::new((id - 13) as u8, false)),
            _ => None,
        }
    }

    fn wheel_position(&self) -> u8 {
        let relative_major = if self.is_major {
            self.pitch_class
        } else {
            (self.pitch_class + 3) % 12
        };
        OPEN_KEY_WHEEL[relative_major as usize]
    }

    /// Open Key, e.g. `1d` for C, `1m` for Am
    pub fn to_open_key(&self) -> String {
        let mode = if self.is_major { 'd' } else { 'm' };
        format!("{}{}", self.wheel_position(), mode)
    }

    /// Camelot (Lancelot), e.g. `8B` for C, `8A` for Am.
    /// The Camelot wheel is the Open Key wheel turned by seven steps.
    pub fn to_camelot(&self) -> String {
        let position = (self.wheel_position() + 6) % 12 + 1;
        let mode = if self.is_major { 'B' } else { 'A' };
        format!("{}{}", position, mode)
    }

    /// Note name, `m` suffix for minor
    pub fn name(&self) -> String {
        let note = PITCH_NAMES[self.pitch_class as usize];
        if self.is_major {
            note.to_string()
        } else {
            format!("{}m", note)
        }
    }

    pub fn render(&self, notation: KeyNotation) -> String {
        match notation {
            KeyNotation::Lancelot => self.to_camelot(),
            KeyNotation::OpenKey => self.to_open_key(),
            KeyNotation::Traditional => self.name(),
        }
    }
}
