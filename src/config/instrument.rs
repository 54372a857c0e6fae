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
use serde::{Deserialize, Serialize};

use crate::note::{Note, NoteName};
use crate::samples::Sample;

/// A YAML representation of one recorded pitch.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SampleFile {
    /// The recorded pitch class.
    name: NoteName,

    /// The recorded octave.
    octave: i32,

    /// The asset reference, relative to the samples path unless absolute.
    file: String,
}

impl SampleFile {
    pub fn new(name: NoteName, octave: i32, file: &str) -> SampleFile {
        SampleFile {
            name,
            octave,
            file: file.to_string(),
        }
    }

    /// Converts the YAML form into a bank sample.
    pub fn to_sample(&self) -> Sample {
        Sample::new(Note::new(self.name, self.octave), &self.file)
    }
}

/// A YAML representation of an instrument and its sample bank.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Instrument {
    /// The instrument name loops refer to.
    name: String,

    /// The recorded pitches, in lookup order.
    #[serde(default)]
    samples: Vec<SampleFile>,
}

impl Instrument {
    pub fn new(name: &str, samples: Vec<SampleFile>) -> Instrument {
        Instrument {
            name: name.to_string(),
            samples,
        }
    }

    /// Returns the instrument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Converts the sample list, preserving its order.
    pub fn to_samples(&self) -> Vec<Sample> {
        self.samples.iter().map(SampleFile::to_sample).collect()
    }
}
