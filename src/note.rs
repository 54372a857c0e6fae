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

//! Notes, enharmonic spellings and semitone arithmetic.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The twelve pitch classes in chromatic order, starting at C.
const CHROMATIC: [NoteName; 12] = [
    NoteName::C,
    NoteName::CSharp,
    NoteName::D,
    NoteName::DSharp,
    NoteName::E,
    NoteName::F,
    NoteName::FSharp,
    NoteName::G,
    NoteName::GSharp,
    NoteName::A,
    NoteName::ASharp,
    NoteName::B,
];

/// One of the 17 supported pitch-class spellings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum NoteName {
    C,
    CSharp,
    DFlat,
    D,
    DSharp,
    EFlat,
    E,
    F,
    FSharp,
    GFlat,
    G,
    GSharp,
    AFlat,
    A,
    ASharp,
    BFlat,
    B,
}

impl NoteName {
    /// Every spelling, naturals and sharps first in chromatic order followed by the flats.
    pub const ALL: [NoteName; 17] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
        NoteName::DFlat,
        NoteName::EFlat,
        NoteName::GFlat,
        NoteName::AFlat,
        NoteName::BFlat,
    ];

    /// Maps flat spellings onto their sharp equivalent. Identity on naturals and sharps.
    pub fn normalize(self) -> NoteName {
        match self {
            NoteName::DFlat => NoteName::CSharp,
            NoteName::EFlat => NoteName::DSharp,
            NoteName::GFlat => NoteName::FSharp,
            NoteName::AFlat => NoteName::GSharp,
            NoteName::BFlat => NoteName::ASharp,
            name => name,
        }
    }

    /// Position of the pitch class within the octave, 0 (C) through 11 (B).
    pub fn chromatic_index(self) -> i32 {
        let normalized = self.normalize();
        CHROMATIC
            .iter()
            .position(|name| *name == normalized)
            .map_or(0, |index| index as i32)
    }

    /// The conventional spelling, e.g. `"C#"` or `"Bb"`.
    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::DFlat => "Db",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::EFlat => "Eb",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::GFlat => "Gb",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::AFlat => "Ab",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::BFlat => "Bb",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a note or note name can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseNoteError {
    #[error("unknown note name '{0}'")]
    UnknownName(String),

    #[error("invalid octave in note '{0}'")]
    InvalidOctave(String),
}

impl FromStr for NoteName {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        NoteName::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == name)
            .or_else(|| {
                // Accept the unicode accidentals used in sample file names.
                let ascii = name.replace('♯', "#").replace('♭', "b");
                NoteName::ALL
                    .into_iter()
                    .find(|candidate| candidate.as_str() == ascii)
            })
            .ok_or_else(|| ParseNoteError::UnknownName(name.to_string()))
    }
}

impl TryFrom<String> for NoteName {
    type Error = ParseNoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteName> for String {
    fn from(name: NoteName) -> Self {
        name.as_str().to_string()
    }
}

/// A pitch: a spelled note name in a given octave.
///
/// Two notes are equal when they sound at the same pitch, so `C#5 == Db5`. The spelling is kept
/// for display and serialization only.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Note {
    pub name: NoteName,
    pub octave: i32,
}

impl Note {
    pub fn new(name: NoteName, octave: i32) -> Note {
        Note { name, octave }
    }

    /// Absolute pitch in semitones: `octave * 12 + chromatic index`. Defined for every octave.
    pub fn pitch_value(&self) -> i64 {
        i64::from(self.octave) * 12 + i64::from(self.name.chromatic_index())
    }

    /// Signed semitone distance from `other` up to `self`.
    pub fn distance(&self, other: &Note) -> i64 {
        self.pitch_value() - other.pitch_value()
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.pitch_value() == other.pitch_value()
    }
}

impl Eq for Note {}

impl Hash for Note {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pitch_value().hash(state);
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

impl FromStr for Note {
    type Err = ParseNoteError;

    /// Parses scientific pitch notation such as `"Ab4"`, `"C#5"` or `"B-1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '-')
            .map(|(i, _)| i)
            .ok_or_else(|| ParseNoteError::InvalidOctave(s.to_string()))?;
        let (name, octave) = s.split_at(split);
        let octave = octave
            .parse::<i32>()
            .map_err(|_| ParseNoteError::InvalidOctave(s.to_string()))?;

        Ok(Note::new(name.parse()?, octave))
    }
}

/// Maps a flat spelling onto its sharp or natural equivalent.
pub fn normalize(name: NoteName) -> NoteName {
    name.normalize()
}

/// Absolute pitch of a note in semitones.
pub fn pitch_value(note: &Note) -> i64 {
    note.pitch_value()
}

/// Signed semitone distance `pitch_value(a) - pitch_value(b)`.
pub fn distance(a: &Note, b: &Note) -> i64 {
    a.distance(b)
}
