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
use std::{collections::VecDeque, fmt, sync::Arc, time::Instant};

use parking_lot::Mutex;
use tracing::info;

use super::{AudioError, DecodedBuffer, OneShotVoice, OutputGraph, Reverb};

/// How many started voices the mock output remembers. Older ones are forgotten.
pub const STARTED_LOG_LIMIT: usize = 1024;

/// Where the mock output reads its time from.
enum Clock {
    /// Seconds since the output was created.
    Wall(Instant),
    /// A clock that only moves when told to.
    Manual(Mutex<f64>),
}

/// A voice the mock output was asked to start.
#[derive(Clone, Debug)]
pub struct StartedVoice {
    /// The requested start time.
    pub at: f64,
    /// The time the voice actually becomes audible: the later of `at` and the clock.
    pub sounds_at: f64,
    /// The playback rate.
    pub rate: f64,
    /// The number of frames in the played buffer.
    pub frames: usize,
}

/// A mock output graph. Doesn't actually play anything.
pub struct Output {
    name: String,
    clock: Clock,
    started: Mutex<VecDeque<StartedVoice>>,
    reverb: Mutex<Option<Arc<DecodedBuffer>>>,
}

impl Output {
    /// Creates a mock output whose clock follows wall time.
    pub fn wall_clock(name: &str) -> Output {
        Output {
            name: name.to_string(),
            clock: Clock::Wall(Instant::now()),
            started: Mutex::new(VecDeque::new()),
            reverb: Mutex::new(None),
        }
    }

    /// Creates a mock output whose clock starts at `start` and only moves via `set_time`.
    pub fn manual(name: &str, start: f64) -> Output {
        Output {
            name: name.to_string(),
            clock: Clock::Manual(Mutex::new(start)),
            started: Mutex::new(VecDeque::new()),
            reverb: Mutex::new(None),
        }
    }

    /// Moves a manual clock to `time`. Has no effect on a wall clock.
    pub fn set_time(&self, time: f64) {
        if let Clock::Manual(now) = &self.clock {
            *now.lock() = time;
        }
    }

    /// Returns the most recently started voices, in start order.
    pub fn started(&self) -> Vec<StartedVoice> {
        self.started.lock().iter().cloned().collect()
    }

    /// Returns the installed reverb impulse, if any.
    pub fn reverb(&self) -> Option<Arc<DecodedBuffer>> {
        self.reverb.lock().clone()
    }
}

impl OutputGraph for Output {
    fn current_time(&self) -> f64 {
        match &self.clock {
            Clock::Wall(since) => since.elapsed().as_secs_f64(),
            Clock::Manual(now) => *now.lock(),
        }
    }

    fn start(&self, voice: OneShotVoice, at: f64) -> Result<(), AudioError> {
        let sounds_at = at.max(self.current_time());
        info!(
            device = self.name,
            at,
            sounds_at,
            rate = voice.rate(),
            "Starting voice (mock)."
        );

        let mut started = self.started.lock();
        if started.len() == STARTED_LOG_LIMIT {
            started.pop_front();
        }
        started.push_back(StartedVoice {
            at,
            sounds_at,
            rate: voice.rate(),
            frames: voice.buffer().frames(),
        });
        Ok(())
    }

    fn set_reverb(&self, impulse: Arc<DecodedBuffer>) -> Result<(), AudioError> {
        let reverb = Reverb::new(&impulse, impulse.channel_count(), impulse.sample_rate())?;
        info!(device = self.name, frames = reverb.frames(), "Installing reverb (mock).");
        *self.reverb.lock() = Some(impulse);
        Ok(())
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
