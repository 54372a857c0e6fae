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

//! The static catalog of recorded pitches per instrument.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::note::Note;

/// One recorded pitch of one instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    /// The pitch the sample was recorded at.
    note: Note,
    /// The asset reference used to retrieve the audio.
    file: String,
}

impl Sample {
    /// Creates a new sample.
    pub fn new(note: Note, file: &str) -> Sample {
        Sample {
            note,
            file: file.to_string(),
        }
    }

    /// Returns the recorded pitch.
    pub fn note(&self) -> &Note {
        &self.note
    }

    /// Returns the asset reference.
    pub fn file(&self) -> &str {
        &self.file
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.note, self.file)
    }
}

/// Instrument name to samples, in the order they were defined. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct SampleBank {
    instruments: HashMap<String, Vec<Sample>>,
}

impl SampleBank {
    /// Creates a bank from instrument definitions.
    pub fn new(instruments: HashMap<String, Vec<Sample>>) -> SampleBank {
        SampleBank { instruments }
    }

    /// Returns the samples defined for an instrument.
    pub fn samples(&self, instrument: &str) -> Option<&[Sample]> {
        self.instruments.get(instrument).map(|samples| samples.as_slice())
    }

    /// Returns the instrument names, sorted so that output is consistent.
    pub fn instruments(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.instruments.keys().map(|name| name.as_str()).collect();
        names.sort();
        names
    }

    /// Finds the sample of `instrument` closest in pitch to `note`.
    /// Returns None for an unknown instrument or an empty bank.
    pub fn nearest_sample(&self, instrument: &str, note: &Note) -> Option<&Sample> {
        let sample = nearest_sample(self.samples(instrument)?, note)?;
        debug!(
            instrument,
            note = %note,
            sample = %sample,
            "Nearest sample"
        );
        Some(sample)
    }
}

/// Selects the sample minimizing the absolute semitone distance to `note`.
/// Among equally distant samples the first one in bank order wins.
pub fn nearest_sample<'a>(samples: &'a [Sample], note: &Note) -> Option<&'a Sample> {
    // min_by_key keeps the first of equal minimums.
    samples
        .iter()
        .min_by_key(|sample| note.distance(&sample.note).abs())
}
