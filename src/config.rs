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
use std::path::Path;

mod audio;
mod ensemble;
mod error;
mod instrument;
mod loops;

pub use self::audio::{Audio, DEFAULT_DEVICE};
pub use self::ensemble::{Ensemble, DEFAULT_ENSEMBLE};
pub use self::error::ConfigError;
pub use self::instrument::{Instrument, SampleFile};
pub use self::loops::LoopConfig;

/// Loads the ensemble at `path`, or the built-in ensemble when no path is given.
pub fn load(path: Option<&Path>) -> Result<Ensemble, ConfigError> {
    match path {
        Some(path) => Ensemble::deserialize(path),
        None => Ensemble::default_ensemble(),
    }
}
