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
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, span, Level};

use crate::board::Soundboard;

pub mod keyboard;

/// Key-down events for one key arriving within this window belong to the
/// same physical press.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

/// A key-down event from the input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// The pressed key.
    pub key: char,
    /// Whether the fixed trigger modifier was held during the press.
    pub modifier_held: bool,
}

/// A source of key events. Implementations push key-down events in
/// real-time order.
pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<KeyEvent>) -> JoinHandle<Result<(), io::Error>>;
}

/// Admits only the first event per key within the debounce window, so a key
/// held down and auto-repeating at the input layer triggers once.
struct DebounceGate {
    window: Duration,
    last_admitted: HashMap<char, Instant>,
}

impl DebounceGate {
    fn new(window: Duration) -> DebounceGate {
        DebounceGate {
            window,
            last_admitted: HashMap::new(),
        }
    }

    fn admit(&mut self, key: char, now: Instant) -> bool {
        if let Some(&previous) = self.last_admitted.get(&key) {
            if now.duration_since(previous) < self.window {
                return false;
            }
        }
        self.last_admitted.insert(key, now);
        true
    }
}

/// The dispatcher either waits for the next event or is handing a play
/// request off to its own task. Playback never runs in either state.
enum State {
    Idle,
    Dispatching,
}

/// Consumes key events and triggers clip playback.
pub struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    /// Creates a dispatcher consuming events from the given driver.
    pub fn new(board: Arc<Soundboard>, driver: Arc<dyn Driver>) -> Dispatcher {
        Dispatcher {
            handle: tokio::spawn(async move { Dispatcher::consume_events(board, driver).await }),
        }
    }

    /// Join will block until the dispatcher finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    async fn consume_events(board: Arc<Soundboard>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "dispatcher");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let monitor = driver.monitor_events(events_tx);

        info!(clips = board.clips().len(), "Dispatcher started.");

        let mut gate = DebounceGate::new(DEBOUNCE_WINDOW);
        let mut state = State::Idle;
        loop {
            match events_rx.recv().await {
                Some(event) => {
                    Dispatcher::handle_event(&board, &mut gate, &mut state, event, Instant::now());
                }
                None => {
                    info!("Dispatcher closing.");
                    if let Err(e) = monitor.await {
                        error!(
                            err = e.to_string(),
                            "Error waiting for the key monitor to stop."
                        );
                    }
                    return;
                }
            }
        }
    }

    /// Runs one event through the modifier, debounce and keybind checks and
    /// launches playback if everything passes. Playback is detached onto its
    /// own blocking task with its own failure channel; the dispatcher never
    /// waits for it and never queues presses into a backlog. Returns whether
    /// a clip was dispatched.
    fn handle_event(
        board: &Arc<Soundboard>,
        gate: &mut DebounceGate,
        state: &mut State,
        event: KeyEvent,
        now: Instant,
    ) -> bool {
        if !event.modifier_held {
            return false;
        }

        let key = event.key.to_ascii_uppercase();
        if !gate.admit(key, now) {
            debug!(key = key.to_string(), "Discarded auto-repeated key press.");
            return false;
        }

        // Unbound keys are a normal, frequent case.
        let Some(clip) = board.resolve_key(key) else {
            debug!(key = key.to_string(), "No clip bound.");
            return false;
        };

        *state = State::Dispatching;
        let request = board.play_request(&clip);
        let device = board.device();
        info!(
            clip = clip.filename,
            key = key.to_string(),
            "Dispatching clip."
        );
        tokio::task::spawn_blocking(move || {
            if let Err(e) = device.play(&request) {
                error!(
                    err = e.to_string(),
                    clip = %request.path.display(),
                    "Playback failed."
                );
            }
        });
        *state = State::Idle;
        true
    }
}
