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

use super::error::ConfigError;
use crate::note::Note;
use crate::scheduler::Loop;

/// A YAML representation of a loop.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct LoopConfig {
    /// The instrument whose bank supplies the sample.
    instrument: String,

    /// The note to play.
    note: Note,

    /// Seconds between repetitions.
    duration: f64,

    /// Seconds from the start of each period to the sound.
    #[serde(default)]
    delay: f64,
}

impl LoopConfig {
    pub fn new(instrument: &str, note: Note, duration: f64, delay: f64) -> LoopConfig {
        LoopConfig {
            instrument: instrument.to_string(),
            note,
            duration,
            delay,
        }
    }

    /// Returns the referenced instrument.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Converts the YAML form into a scheduler loop. `index` is only used for error reporting.
    pub fn to_loop(&self, index: usize) -> Result<Loop, ConfigError> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ConfigError::InvalidDuration {
                index,
                duration: self.duration,
            });
        }
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(ConfigError::InvalidDelay {
                index,
                delay: self.delay,
            });
        }

        Ok(Loop::new(
            &self.instrument,
            self.note,
            self.duration,
            self.delay,
        ))
    }
}
