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
use tracing::{info, span, Level};

use super::KeyEvent;

/// A key-event driver fed from the terminal. Each line's first character is
/// delivered as one key press. Since typing into the prompt is already a
/// deliberate act, events carry the trigger modifier as held; a global key
/// hook would report the real modifier state through the same seam.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    fn monitor_io<R, W>(
        events_tx: &Sender<KeyEvent>,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Key: ")?;
        writer.flush()?;

        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "key input closed",
            ));
        }

        if let Some(key) = input.trim().chars().next() {
            events_tx
                .blocking_send(KeyEvent {
                    key,
                    modifier_held: true,
                })
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<KeyEvent>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            loop {
                Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())?;
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use super::Driver;
    use crate::dispatch::KeyEvent;

    fn get_event(input: &str) -> Result<Option<KeyEvent>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<KeyEvent>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(
            Some(KeyEvent {
                key: 'k',
                modifier_held: true
            }),
            get_event("k\n")?
        );
        assert_eq!(
            Some(KeyEvent {
                key: 'Q',
                modifier_held: true
            }),
            get_event("Quit\n")?,
            "only the first character counts"
        );
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_closed_input_stops_the_driver() {
        let (sender, _receiver) = mpsc::channel::<KeyEvent>(1);
        let reader = BufReader::new("".as_bytes());
        let writer = BufWriter::new(Vec::new());

        let result = Driver::monitor_io(&sender, reader, writer);
        assert!(result.is_err());
    }
}
