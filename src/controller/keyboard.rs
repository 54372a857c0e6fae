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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const TOGGLE: &str = "toggle";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// A controller that controls the ensemble using the keyboard.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Maps a line of input to an event. An empty line toggles.
    fn parse(input: &str) -> Option<Event> {
        match input.trim().to_lowercase().as_str() {
            "" | "t" | TOGGLE => Some(Event::Toggle),
            "s" | STATUS => Some(Event::Status),
            "q" | QUIT => Some(Event::Quit),
            _ => None,
        }
    }

    /// Reads one command. Returns false once the driver should stop reading.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Command (enter to {}, {}, {}): ", TOGGLE, STATUS, QUIT)?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            info!("Keyboard input closed.");
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let Some(event) = Self::parse(&input) else {
            warn!(input = input.trim(), "Unrecognized input");
            return Ok(true);
        };
        let quit = event == Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(!quit)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};

    use super::{Driver, TOGGLE};

    fn get_event(event: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(event.as_bytes());

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let keep_reading = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((keep_reading, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Toggle)), get_event(TOGGLE)?);
        assert_eq!((true, Some(Event::Toggle)), get_event("t\n")?);
        assert_eq!((true, Some(Event::Toggle)), get_event("\n")?);
        assert_eq!((true, Some(Event::Status)), get_event(STATUS)?);
        assert_eq!((true, Some(Event::Status)), get_event(" S \n")?);
        assert_eq!((false, Some(Event::Quit)), get_event(QUIT)?);
        assert_eq!((false, Some(Event::Quit)), get_event("q\n")?);
        assert_eq!((true, None), get_event("unrecognized")?);
        Ok(())
    }

    #[test]
    fn test_end_of_input_quits() -> Result<(), io::Error> {
        assert_eq!((false, Some(Event::Quit)), get_event("")?);
        Ok(())
    }
}
