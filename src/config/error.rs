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

/// Typed error for ensemble load and validation failures. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("loop {index} references unknown instrument {instrument}")]
    UnknownInstrument { index: usize, instrument: String },

    #[error("instrument {0} has no samples")]
    EmptyBank(String),

    #[error("instrument {0} is defined more than once")]
    DuplicateInstrument(String),

    #[error("loop {index} has invalid duration {duration}, must be a positive number of seconds")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("loop {index} has invalid delay {delay}, must be zero or more seconds")]
    InvalidDelay { index: usize, delay: f64 },

    #[error("gain {0} is outside 0.0..=1.0")]
    InvalidGain(f32),

    #[error("invalid tick interval {value}: {reason}")]
    InvalidTickInterval { value: String, reason: String },
}
