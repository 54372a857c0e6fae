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
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::player::Player;

pub mod keyboard;

/// Controller events that will trigger behavior in the player.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Starts the ensemble if it is stopped, stops it otherwise.
    Toggle,

    /// Prints the progress of every loop.
    Status,

    /// Stops the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls the ensemble.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(player: Arc<Player>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(
                Controller::trigger_events(player, driver)
                    .instrument(span!(Level::INFO, "controller")),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers player events by watching the driver and getting events from it.
    async fn trigger_events(player: Arc<Player>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(loops = player.loops().len(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = ?event, "Received event.");
            match event {
                Event::Toggle => {
                    player.toggle();
                }
                Event::Status => player
                    .status_lines()
                    .iter()
                    .for_each(|line| println!("{}", line)),
                Event::Quit => break,
            }
        }

        info!("Controller closing.");
        player.stop();
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop"),
            Ok(Ok(())) => {}
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, io, sync::Arc, time::Duration};

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use super::{Controller, Driver, Event};
    use crate::{
        audio::mock,
        note::{Note, NoteName},
        playback::PlaybackEngine,
        player::Player,
        samples::{Sample, SampleBank, SampleCache},
        scheduler::{Loop, TransportState},
        testutil::{eventually_async, MockFetcher},
    };

    /// Sends a fixed list of events, then waits for the channel to close.
    struct ScriptedDriver {
        events: Mutex<Vec<Event>>,
    }

    impl Driver for ScriptedDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events: Vec<Event> = self.events.lock().drain(..).collect();
            tokio::spawn(async move {
                for event in events {
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn player(output: Arc<mock::Output>) -> Arc<Player> {
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
        Arc::new(Player::new(
            vec![Loop::new("X", Note::new(NoteName::C, 4), 10.0, 0.0)],
            engine,
            output,
            Duration::from_millis(1),
        ))
    }

    #[tokio::test]
    async fn test_controller_toggles_and_quits() {
        let output = Arc::new(mock::Output::manual("mock", 0.0));
        let player = player(output);
        let driver = Arc::new(ScriptedDriver {
            events: Mutex::new(vec![Event::Toggle, Event::Status, Event::Quit, Event::Toggle]),
        });

        let mut controller = Controller::new(player.clone(), driver);
        assert!(controller.join().await.is_ok());

        // Events after quit are never handled, and quitting stops the ensemble.
        assert_eq!(TransportState::Stopped, player.state());
    }

    #[tokio::test]
    async fn test_controller_closes_with_driver() {
        let output = Arc::new(mock::Output::manual("mock", 0.0));
        let player = player(output.clone());
        let driver = Arc::new(ScriptedDriver {
            events: Mutex::new(vec![Event::Toggle, Event::Toggle, Event::Toggle]),
        });

        let mut controller = Controller::new(player.clone(), driver);
        assert!(controller.join().await.is_ok());
        assert_eq!(TransportState::Stopped, player.state());

        // Three toggles started the ensemble twice.
        eventually_async(
            || async { output.started().len() == 2 },
            "Expected two started voices",
        )
        .await;
    }
}
