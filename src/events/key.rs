// Key signatures
// Key names such as "Eb" or "F#m" mapped onto the circle of fifths

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeySignatureError {
    #[error("Unknown key name: {0:?}")]
    UnknownKey(String),

    #[error("Key {0:?} needs more than seven sharps or flats")]
    OutOfRange(String),
}

const MAJOR_NAMES: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

const MINOR_NAMES: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

/// A key as written in a MIDI key-signature meta event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeySignature {
    /// Positive for sharps, negative for flats, within -7..=7
    pub sharps: i8,
    pub minor: bool,
}

impl KeySignature {
    pub fn new(sharps: i8, minor: bool) -> Result<Self, KeySignatureError> {
        if !(-7..=7).contains(&sharps) {
            return Err(KeySignatureError::OutOfRange(format!("{}", sharps)));
        }
        Ok(KeySignature { sharps, minor })
    }

    pub fn name(&self) -> String {
        let index = (self.sharps.clamp(-7, 7) + 7) as usize;
        if self.minor {
            format!("{}m", MINOR_NAMES[index])
        } else {
            MAJOR_NAMES[index].to_string()
        }
    }
}

impl FromStr for KeySignature {
    type Err = KeySignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unknown = || KeySignatureError::UnknownKey(s.to_string());

        let mut chars = trimmed.chars();
        let letter_fifths: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('F') => -1,
            Some('C') => 0,
            Some('G') => 1,
            Some('D') => 2,
            Some('A') => 3,
            Some('E') => 4,
            Some('B') => 5,
            _ => return Err(unknown()),
        };

        let rest = chars.as_str();
        let (accidental, mode) = match rest.chars().next() {
            Some('#') => (7, &rest[1..]),
            Some('b') => (-7, &rest[1..]),
            _ => (0, rest),
        };

        let minor = match mode {
            "" => false,
            "m" => true,
            _ => return Err(unknown()),
        };

        let sharps = letter_fifths + accidental - if minor { 3 } else { 0 };
        if !(-7..=7).contains(&sharps) {
            return Err(KeySignatureError::OutOfRange(s.to_string()));
        }

        Ok(KeySignature {
            sharps: sharps as i8,
            minor,
        })
    }
}

impl TryFrom<String> for KeySignature {
    type Error = KeySignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeySignature> for String {
    fn from(key: KeySignature) -> Self {
        key.name()
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
