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
use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fs::File,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures_util::FutureExt;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::audio::DecodedBuffer;
use crate::samples::{FetchFuture, SampleError, SampleFetcher};

/// Number of frames in every buffer the mock fetcher produces.
pub const MOCK_FRAMES: usize = 64;

/// A sample fetcher that counts calls and can hold fetches until released.
pub struct MockFetcher {
    calls: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    /// Fetches wait on this until it is closed.
    gate: Arc<Semaphore>,
}

impl MockFetcher {
    /// Creates a fetcher that resolves immediately.
    pub fn new() -> MockFetcher {
        let fetcher = MockFetcher::gated();
        fetcher.release();
        fetcher
    }

    /// Creates a fetcher whose fetches stay pending until `release` is called.
    pub fn gated() -> MockFetcher {
        MockFetcher {
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets every pending and future fetch complete.
    pub fn release(&self) {
        self.gate.close();
    }

    /// Makes fetches of `file` started from now on fail.
    pub fn fail(&self, file: &str) {
        self.failing.lock().insert(file.to_string());
    }

    /// Makes fetches of `file` started from now on succeed again.
    pub fn heal(&self, file: &str) {
        self.failing.lock().remove(file);
    }

    /// Returns how many fetches of `file` were started.
    pub fn calls(&self, file: &str) -> usize {
        self.calls.lock().get(file).copied().unwrap_or(0)
    }
}

impl SampleFetcher for MockFetcher {
    fn fetch(&self, file: &str) -> FetchFuture {
        *self.calls.lock().entry(file.to_string()).or_insert(0) += 1;
        let fails = self.failing.lock().contains(file);
        let gate = self.gate.clone();
        let file = file.to_string();

        async move {
            // Acquiring only fails once the gate is closed.
            let _ = gate.acquire().await;
            if fails {
                Err(SampleError::Other(format!("mock failure for {}", file)))
            } else {
                Ok(Arc::new(DecodedBuffer::new(
                    vec![0.0; MOCK_FRAMES],
                    1,
                    44100,
                )))
            }
        }
        .boxed()
    }
}

/// Wait for the given async predicate to return true or fail.
#[inline]
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Writes planar f32 channels to an interleaved 32-bit float WAV file.
pub fn write_wav(path: PathBuf, channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    let num_channels = channels.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(|channel| channel.len()).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in &channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}
