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

//! The loop scheduler and its transport clock.
//!
//! Every loop is a small value object tracking how many of its periods have fired. A single
//! central [`LoopScheduler::tick`] dispatches the periods that have come due, so stopping is just
//! dropping those objects and tests can fast-forward by calling `tick` with later times.
//!
//! All times are seconds on the output graph's clock.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::note::Note;

/// One independently repeating phrase.
#[derive(Clone, Debug, PartialEq)]
pub struct Loop {
    /// The instrument whose bank supplies the sample.
    pub instrument: String,
    /// The note to play.
    pub note: Note,
    /// Seconds between repetitions.
    pub duration: f64,
    /// Seconds from the start of each period to the sound.
    pub delay: f64,
}

impl Loop {
    pub fn new(instrument: &str, note: Note, duration: f64, delay: f64) -> Loop {
        Loop {
            instrument: instrument.to_string(),
            note,
            duration,
            delay,
        }
    }

    /// The start of period `k` for a transport started at `since`.
    pub fn period_start(&self, since: f64, k: u64) -> f64 {
        since + k as f64 * self.duration
    }

    /// True when the loop repeats at all: its duration is positive and finite.
    pub fn repeats(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }

    /// The last period that has started by `now`, or None before the transport start.
    pub fn latest_period(&self, since: f64, now: f64) -> Option<u64> {
        if !self.repeats() || now < since {
            return None;
        }

        // Float division can land one period off either way.
        let mut k = ((now - since) / self.duration).floor() as u64;
        if k > 0 && self.period_start(since, k) > now {
            k -= 1;
        }
        if self.period_start(since, k.saturating_add(1)) <= now {
            k = k.saturating_add(1);
        }
        Some(k)
    }
}

impl fmt::Display for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} every {:.1}s (+{:.1}s)",
            self.instrument, self.note, self.duration, self.delay
        )
    }
}

/// Receives the firings of the scheduler. Implementations must not block and must not fail.
pub trait Trigger: Send + Sync + 'static {
    /// Plays `lp`'s note `delay` seconds from now.
    fn fire(&self, lp: &Loop, delay: f64);
}

/// Whether the ensemble is playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "stopped"),
            TransportState::Playing => write!(f, "playing"),
        }
    }
}

/// The single timestamp all loops and the renderer compute phase from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransportClock {
    playing_since: Option<f64>,
}

impl TransportClock {
    /// A transport that started at `since`.
    pub fn playing(since: f64) -> TransportClock {
        TransportClock {
            playing_since: Some(since),
        }
    }

    /// When the ensemble was last started, or None when stopped.
    pub fn playing_since(&self) -> Option<f64> {
        self.playing_since
    }

    pub fn state(&self) -> TransportState {
        match self.playing_since {
            Some(_) => TransportState::Playing,
            None => TransportState::Stopped,
        }
    }
}

/// The live state of one configured loop while the ensemble plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningLoop {
    /// Index into the scheduler's loops.
    index: usize,
    /// How many periods have been dispatched or skipped.
    fired: u64,
}

impl RunningLoop {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }
}

/// Starts, stops and drives the whole ensemble.
pub struct LoopScheduler {
    loops: Arc<[Loop]>,
    trigger: Arc<dyn Trigger>,
    transport: TransportClock,
    running: Vec<RunningLoop>,
}

impl LoopScheduler {
    /// Creates a stopped scheduler for the given loops. Loops that don't repeat are kept but never
    /// fire.
    pub fn new(loops: Vec<Loop>, trigger: Arc<dyn Trigger>) -> LoopScheduler {
        for lp in loops.iter().filter(|lp| !lp.repeats()) {
            warn!(lp = %lp, "Loop duration is not positive, it will never play");
        }

        LoopScheduler {
            loops: loops.into(),
            trigger,
            transport: TransportClock::default(),
            running: Vec::new(),
        }
    }

    pub fn loops(&self) -> Arc<[Loop]> {
        Arc::clone(&self.loops)
    }

    pub fn transport(&self) -> TransportClock {
        self.transport
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn running(&self) -> &[RunningLoop] {
        &self.running
    }

    /// Starts the transport at `now` and fires every loop once with its delay.
    /// Returns false, doing nothing, if already playing.
    pub fn start(&mut self, now: f64) -> bool {
        if self.transport.playing_since.is_some() {
            return false;
        }

        self.transport.playing_since = Some(now);
        self.running = self
            .loops
            .iter()
            .enumerate()
            .filter(|(_, lp)| lp.repeats())
            .map(|(index, lp)| {
                self.trigger.fire(lp, lp.delay);
                RunningLoop { index, fired: 1 }
            })
            .collect();

        info!(at = now, loops = self.running.len(), "Transport started");
        true
    }

    /// Cancels every future firing and clears the transport. Firings already dispatched are
    /// left alone. Returns false, doing nothing, if already stopped.
    pub fn stop(&mut self) -> bool {
        let Some(since) = self.transport.playing_since.take() else {
            return false;
        };

        self.running.clear();
        info!(started_at = since, "Transport stopped");
        true
    }

    /// Flips between stopped and playing, returning the new state.
    pub fn toggle(&mut self, now: f64) -> TransportState {
        match self.transport.state() {
            TransportState::Stopped => self.start(now),
            TransportState::Playing => self.stop(),
        };
        self.transport.state()
    }

    /// Dispatches every period that has started by `now`. Each firing sounds at its period start
    /// plus the loop delay, however late the tick is. When a loop has fallen more than a period
    /// behind, only its latest due period fires. Returns the number of firings dispatched.
    pub fn tick(&mut self, now: f64) -> usize {
        let Some(since) = self.transport.playing_since else {
            return 0;
        };

        let mut dispatched = 0;
        for running in self.running.iter_mut() {
            let lp = &self.loops[running.index];
            let Some(latest) = lp.latest_period(since, now) else {
                continue;
            };
            if latest < running.fired {
                continue;
            }

            let skipped = latest - running.fired;
            if skipped > 0 {
                debug!(loop_index = running.index, skipped, "Skipped stale loop periods");
            }
            running.fired = latest.saturating_add(1);
            self.trigger
                .fire(lp, (lp.period_start(since, latest) + lp.delay - now).max(0.0));
            dispatched += 1;
        }
        dispatched
    }
}

impl fmt::Debug for LoopScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopScheduler")
            .field("loops", &self.loops.len())
            .field("transport", &self.transport)
            .field("running", &self.running.len())
            .finish()
    }
}
