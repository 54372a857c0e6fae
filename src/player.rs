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
use std::{error::Error, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{info, span, Instrument, Level};

use crate::{
    audio::{self, OutputGraph},
    config::Ensemble,
    playback::{PlaybackEngine, PlaybackError},
    render,
    samples::{FileFetcher, SampleCache},
    scheduler::{Loop, LoopScheduler, TransportClock, TransportState, Trigger},
};

/// Plays an ensemble of loops on the output graph.
pub struct Player {
    /// The scheduler. Only the ticker calls `tick`.
    scheduler: Arc<Mutex<LoopScheduler>>,
    /// The output graph whose clock is the transport time base.
    output: Arc<dyn OutputGraph>,
    /// Drives the scheduler until the player is dropped.
    ticker: JoinHandle<()>,
}

impl Player {
    /// Creates a stopped player and starts its ticker. Must be called within a tokio runtime.
    pub fn new(
        loops: Vec<Loop>,
        trigger: Arc<dyn Trigger>,
        output: Arc<dyn OutputGraph>,
        tick_interval: Duration,
    ) -> Player {
        let scheduler = Arc::new(Mutex::new(LoopScheduler::new(loops, trigger)));
        let ticker = tokio::spawn(
            Player::drive(scheduler.clone(), output.clone(), tick_interval)
                .instrument(span!(Level::INFO, "player ticker")),
        );

        Player {
            scheduler,
            output,
            ticker,
        }
    }

    /// Opens the configured output and builds the sample pipeline for an ensemble.
    /// A configured reverb is loaded before the player exists, so the first firing is already
    /// reverberated.
    pub async fn from_ensemble(ensemble: &Ensemble) -> Result<Player, Box<dyn Error>> {
        let audio_config = ensemble.audio();
        let output = audio::open_output(&audio_config)?;
        let bank = Arc::new(ensemble.sample_bank()?);
        let cache = Arc::new(SampleCache::new(Arc::new(FileFetcher::new(
            &ensemble.samples_path(),
        ))));
        if let Some(impulse) = audio_config.reverb() {
            install_reverb(&cache, impulse, output.as_ref()).await?;
        }
        let engine = Arc::new(PlaybackEngine::new(bank, cache, output.clone()));

        Ok(Player::new(
            ensemble.loops()?,
            engine,
            output,
            audio_config.tick_interval()?,
        ))
    }

    /// The one caller of the scheduler's tick.
    async fn drive(
        scheduler: Arc<Mutex<LoopScheduler>>,
        output: Arc<dyn OutputGraph>,
        tick_interval: Duration,
    ) {
        let mut interval = time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = tick_interval.as_millis(), "Ticker started.");

        loop {
            interval.tick().await;
            let now = output.current_time();
            scheduler.lock().tick(now);
        }
    }

    /// Flips the ensemble between stopped and playing.
    pub fn toggle(&self) -> TransportState {
        let now = self.output.current_time();
        let state = self.scheduler.lock().toggle(now);
        info!(state = %state, at = now, "Toggled transport.");
        state
    }

    /// Starts the ensemble if it is stopped.
    pub fn start(&self) -> bool {
        let now = self.output.current_time();
        self.scheduler.lock().start(now)
    }

    /// Stops the ensemble if it is playing.
    pub fn stop(&self) -> bool {
        self.scheduler.lock().stop()
    }

    pub fn state(&self) -> TransportState {
        self.scheduler.lock().state()
    }

    pub fn transport(&self) -> TransportClock {
        self.scheduler.lock().transport()
    }

    pub fn loops(&self) -> Arc<[Loop]> {
        self.scheduler.lock().loops()
    }

    /// The text rendering of every loop's progress right now.
    pub fn status_lines(&self) -> Vec<String> {
        let (loops, transport) = {
            let scheduler = self.scheduler.lock();
            (scheduler.loops(), scheduler.transport())
        };
        render::status_lines(&loops, &transport, self.output.current_time())
    }
}

/// Retrieves the impulse through the sample cache and routes the mix through it.
async fn install_reverb(
    cache: &SampleCache,
    impulse: &str,
    output: &dyn OutputGraph,
) -> Result<(), PlaybackError> {
    let buffer = cache.fetch(impulse).await.map_err(PlaybackError::Fetch)?;
    info!(impulse, frames = buffer.frames(), "Loaded reverb impulse.");
    output.set_reverb(buffer)?;
    Ok(())
}

impl Drop for Player {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::audio::mock;
    use crate::note::{Note, NoteName};
    use crate::samples::{Sample, SampleBank};
    use crate::testutil::{eventually_async, write_wav, MockFetcher};

    fn player(output: Arc<mock::Output>) -> Player {
        let bank = SampleBank::new(HashMap::from([(
            "X".to_string(),
            vec![Sample::new(Note::new(NoteName::C, 4), "c4.wav")],
        )]));
        let cache = Arc::new(SampleCache::new(Arc::new(MockFetcher::new())));
        let engine = Arc::new(PlaybackEngine::new(
            Arc::new(bank),
            cache,
            output.clone(),
        ));

        Player::new(
            vec![Loop::new("X", Note::new(NoteName::D, 4), 10.0, 4.0)],
            engine,
            output,
            Duration::from_millis(1),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_player() {
        let output = Arc::new(mock::Output::manual("mock", 100.0));
        let player = player(output.clone());
        assert_eq!(TransportState::Stopped, player.state());

        assert_eq!(TransportState::Playing, player.toggle());
        assert_eq!(Some(100.0), player.transport().playing_since());
        eventually_async(
            || async { output.started().len() == 1 },
            "Initial firing never started",
        )
        .await;
        assert_eq!(104.0, output.started()[0].at);

        // The ticker picks up the next period from the output clock.
        output.set_time(110.0);
        eventually_async(
            || async { output.started().len() == 2 },
            "Second firing never started",
        )
        .await;
        assert_eq!(114.0, output.started()[1].at);
        assert!((output.started()[1].rate - 2f64.powf(2.0 / 12.0)).abs() < 1e-12);

        assert_eq!(TransportState::Stopped, player.toggle());
        assert_eq!(None, player.transport().playing_since());
        output.set_time(130.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(2, output.started().len());
    }

    #[tokio::test]
    async fn test_status_lines() {
        let output = Arc::new(mock::Output::manual("mock", 0.0));
        let player = player(output.clone());

        let lines = player.status_lines();
        assert_eq!("Transport: stopped", lines[0]);
        assert!(lines[1].ends_with("idle"));

        assert!(player.start());
        assert!(!player.start());
        output.set_time(61.0);
        let lines = player.status_lines();
        assert_eq!("Transport: playing for 1:01", lines[0]);
        assert!(lines[1].ends_with("next in  3.0s"));

        assert!(player.stop());
        assert!(!player.stop());
    }

    #[tokio::test]
    async fn test_install_reverb() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        write_wav(tempdir.path().join("hall.wav"), vec![vec![1.0, 0.5, 0.25]], 44100)?;
        let cache = SampleCache::new(Arc::new(FileFetcher::new(tempdir.path())));
        let output = mock::Output::manual("mock", 0.0);

        let missing = install_reverb(&cache, "cave.wav", &output).await;
        assert!(matches!(missing, Err(PlaybackError::Fetch(_))));
        assert!(output.reverb().is_none());

        install_reverb(&cache, "hall.wav", &output).await?;
        let impulse = output.reverb().expect("reverb installed");
        assert_eq!(3, impulse.frames());
        assert!(cache.contains("hall.wav"));
        Ok(())
    }

    #[tokio::test]
    async fn test_from_ensemble_requires_reverb_impulse() -> Result<(), Box<dyn std::error::Error>>
    {
        let tempdir = tempfile::tempdir()?;
        write_wav(tempdir.path().join("c4.wav"), vec![vec![0.0; 16]], 44100)?;
        let yaml = format!(
            r#"
samples_path: "{}"
audio:
  device: "mock-output"
  reverb: "hall.wav"
instruments:
  - name: "X"
    samples:
      - {{ name: "C", octave: 4, file: "c4.wav" }}
loops:
  - {{ instrument: "X", note: {{ name: "D", octave: 4 }}, duration: 10, delay: 4 }}
"#,
            tempdir.path().display()
        );

        let ensemble = Ensemble::from_yaml(&yaml)?;
        assert!(Player::from_ensemble(&ensemble).await.is_err());

        write_wav(tempdir.path().join("hall.wav"), vec![vec![1.0, 0.5]], 44100)?;
        let player = Player::from_ensemble(&ensemble).await?;
        assert_eq!(1, player.loops().len());
        assert_eq!(TransportState::Stopped, player.state());
        Ok(())
    }
}
