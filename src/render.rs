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

//! Loop progress, derived from scratch from the transport and the loop periods.
//!
//! Nothing here reads playback state, so the display keeps going when samples fail.

use std::f64::consts::TAU;

use crate::scheduler::{Loop, TransportClock};
use crate::util::format_elapsed;

const BAR_WIDTH: usize = 24;

/// The progress of one loop at a given instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoopPhase {
    /// The transport is stopped, or the loop never repeats.
    Idle,
    Playing {
        /// Angle swept through the current period, in `[0, 2π)`.
        phase: f64,
        /// Angle of the loop's sound within the period, in `[0, 2π)`, measured from `phase`.
        marker: f64,
        /// Seconds until the loop next sounds.
        until_next: f64,
    },
}

/// Angle swept through the current period of a loop of `duration` seconds.
pub fn phase(duration: f64, since: f64, now: f64) -> f64 {
    (now - since).rem_euclid(duration) / duration * TAU
}

/// Derives the progress of every loop.
pub fn loop_phases(loops: &[Loop], transport: &TransportClock, now: f64) -> Vec<LoopPhase> {
    loops
        .iter()
        .map(|lp| match transport.playing_since() {
            Some(since) if lp.repeats() => {
                let to_sound = lp.delay - (now - since);
                LoopPhase::Playing {
                    phase: phase(lp.duration, since, now),
                    marker: (to_sound * TAU / lp.duration).rem_euclid(TAU),
                    until_next: to_sound.rem_euclid(lp.duration),
                }
            }
            _ => LoopPhase::Idle,
        })
        .collect()
}

/// A text rendering: a transport line followed by one line per loop.
pub fn status_lines(loops: &[Loop], transport: &TransportClock, now: f64) -> Vec<String> {
    let mut lines = Vec::with_capacity(loops.len() + 1);
    lines.push(match transport.playing_since() {
        Some(since) => format!("Transport: playing for {}", format_elapsed(now - since)),
        None => "Transport: stopped".to_string(),
    });

    for (lp, progress) in loops.iter().zip(loop_phases(loops, transport, now)) {
        let label = format!("{} {}", lp.instrument, lp.note);
        lines.push(match progress {
            LoopPhase::Idle => format!("{:<18} [{}] idle", label, "-".repeat(BAR_WIDTH)),
            LoopPhase::Playing {
                phase,
                marker,
                until_next,
            } => format!(
                "{:<18} [{}] next in {:>4.1}s",
                label,
                bar(phase, phase + marker),
                until_next
            ),
        });
    }
    lines
}

/// Fills the bar up to `phase` and marks where the sound falls.
fn bar(phase: f64, sound: f64) -> String {
    let position = |angle: f64| ((angle.rem_euclid(TAU) / TAU) * BAR_WIDTH as f64) as usize;
    let filled = position(phase);
    let sound = position(sound).min(BAR_WIDTH - 1);

    (0..BAR_WIDTH)
        .map(|i| match i {
            i if i == sound => '*',
            i if i < filled => '=',
            _ => ' ',
        })
        .collect()
}
