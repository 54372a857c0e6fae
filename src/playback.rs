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

//! Turns a note into a pitch-shifted one-shot voice on the output graph.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audio::{AudioError, DecodedBuffer, OneShotVoice, OutputGraph};
use crate::note::Note;
use crate::samples::{FetchResult, Sample, SampleBank, SampleCache, SampleError};
use crate::scheduler::{Loop, Trigger};

/// Errors for a single playback. None of these escape a trigger.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no samples for instrument {0}")]
    NoSamples(String),

    #[error("unable to retrieve sample: {0}")]
    Fetch(Arc<SampleError>),

    #[error("unable to start voice: {0}")]
    Output(#[from] AudioError),
}

/// The equal-tempered speed multiplier that shifts a sample by `semitone_offset` semitones.
pub fn playback_rate(semitone_offset: i64) -> f64 {
    2f64.powf(semitone_offset as f64 / 12.0)
}

/// A sample chosen for a note, its decoded audio and the shift needed to reach the note.
#[derive(Clone, Debug)]
pub struct ResolvedPlayback {
    pub sample: Sample,
    pub buffer: Arc<DecodedBuffer>,
    pub semitone_offset: i64,
}

impl ResolvedPlayback {
    pub fn rate(&self) -> f64 {
        playback_rate(self.semitone_offset)
    }
}

/// Plays notes from the sample bank on the shared output graph.
pub struct PlaybackEngine {
    bank: Arc<SampleBank>,
    cache: Arc<SampleCache>,
    output: Arc<dyn OutputGraph>,
}

impl PlaybackEngine {
    pub fn new(
        bank: Arc<SampleBank>,
        cache: Arc<SampleCache>,
        output: Arc<dyn OutputGraph>,
    ) -> PlaybackEngine {
        PlaybackEngine {
            bank,
            cache,
            output,
        }
    }

    pub fn output(&self) -> &Arc<dyn OutputGraph> {
        &self.output
    }

    /// Picks the nearest sample and the signed semitone shift from it to `note`.
    pub fn nearest(&self, instrument: &str, note: &Note) -> Result<(Sample, i64), PlaybackError> {
        let sample = self
            .bank
            .nearest_sample(instrument, note)
            .ok_or_else(|| PlaybackError::NoSamples(instrument.to_string()))?;
        Ok((sample.clone(), note.distance(sample.note())))
    }

    /// Finds the nearest sample, waits for its buffer and computes the semitone shift.
    pub async fn resolve_playback(
        &self,
        instrument: &str,
        note: &Note,
    ) -> Result<ResolvedPlayback, PlaybackError> {
        let (sample, semitone_offset) = self.nearest(instrument, note)?;
        let buffer = self
            .cache
            .fetch(sample.file())
            .await
            .map_err(PlaybackError::Fetch)?;

        Ok(ResolvedPlayback {
            sample,
            buffer,
            semitone_offset,
        })
    }

    /// Schedules `note` to sound `delay` seconds from now and returns without waiting.
    ///
    /// The start time and the cache request are fixed before this returns, so a slow decode makes
    /// the sound late rather than moving its target. Failures are logged and leave this one
    /// firing silent.
    pub fn trigger(&self, instrument: &str, note: Note, delay: f64) -> JoinHandle<()> {
        let at = self.output.current_time() + delay.max(0.0);
        let pending = self.nearest(instrument, &note).map(|(sample, semitone_offset)| {
            let fetch = self.cache.fetch(sample.file());
            (sample, semitone_offset, fetch)
        });

        let output = Arc::clone(&self.output);
        let instrument = instrument.to_string();
        tokio::spawn(async move {
            if let Err(e) = play(pending, output, at).await {
                warn!(
                    instrument,
                    note = %note,
                    at,
                    err = %e,
                    "Playback failed, firing is silent"
                );
            }
        })
    }
}

async fn play(
    pending: Result<(Sample, i64, impl Future<Output = FetchResult>), PlaybackError>,
    output: Arc<dyn OutputGraph>,
    at: f64,
) -> Result<(), PlaybackError> {
    let (sample, semitone_offset, fetch) = pending?;
    let buffer = fetch.await.map_err(PlaybackError::Fetch)?;
    let rate = playback_rate(semitone_offset);

    debug!(sample = %sample, semitone_offset, rate, at, "Starting voice");
    output.start(OneShotVoice::new(buffer, rate), at)?;
    Ok(())
}

impl Trigger for PlaybackEngine {
    fn fire(&self, lp: &Loop, delay: f64) {
        // Detached: stopping the transport never cancels a dispatched firing.
        self.trigger(&lp.instrument, lp.note, delay);
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("instruments", &self.bank.instruments().len())
            .field("cache", &self.cache)
            .finish()
    }
}
