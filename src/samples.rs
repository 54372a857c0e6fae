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

//! Recorded samples and their retrieval.
//!
//! This module provides:
//! - The per-instrument sample bank and nearest-pitch lookup
//! - Sample retrieval and decoding into memory
//! - A cache that fetches each asset at most once

mod bank;
mod cache;
mod loader;

pub use bank::{nearest_sample, Sample, SampleBank};
pub use cache::{FetchResult, SampleCache};
pub use loader::{decode_file, FetchFuture, FileFetcher, SampleError, SampleFetcher};
