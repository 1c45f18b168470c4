//! Key-press command source.
//!
//! Turns characters read from the terminal into [`Event`]s for the manager.
//! The terminal is left in its normal line-buffered mode, so keys arrive
//! when the operator presses return; every character of a line is
//! dispatched in order.

use crate::config::QUIT_KEY;
use endpoint_core::{Event, StartupBarrier};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one key press amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Sent(Event),
    Unbound,
    Quit,
    /// The manager is no longer accepting events
    Closed,
}

/// Why the listener stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Quit,
    InputClosed,
    EventsClosed,
    Shutdown,
}

pub struct KeyListener {
    keys: HashMap<char, Event>,
    events: mpsc::Sender<Event>,
}

impl KeyListener {
    pub fn new(keys: HashMap<char, Event>, events: mpsc::Sender<Event>) -> Self {
        Self { keys, events }
    }

    pub async fn dispatch(&self, key: char) -> KeyOutcome {
        if key == QUIT_KEY {
            return KeyOutcome::Quit;
        }
        let Some(event) = self.keys.get(&key).copied() else {
            debug!(key = ?key, "Unbound key, ignoring");
            return KeyOutcome::Unbound;
        };

        info!(key = ?key, event = %event, "Key press");
        match self.events.send(event).await {
            Ok(()) => KeyOutcome::Sent(event),
            Err(_) => KeyOutcome::Closed,
        }
    }

    /// Read `input` until it ends, the quit key is pressed or `shutdown`
    /// fires. The quit key also cancels `shutdown` for everyone else.
    pub async fn listen<R>(self, input: R, shutdown: CancellationToken) -> ListenerExit
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(input).lines();

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return ListenerExit::Shutdown,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => return ListenerExit::InputClosed,
                Err(e) => {
                    warn!(error = %e, "Failed to read key presses");
                    return ListenerExit::InputClosed;
                }
            };

            for key in line.chars() {
                match self.dispatch(key).await {
                    KeyOutcome::Quit => {
                        info!("Received quit key");
                        shutdown.cancel();
                        return ListenerExit::Quit;
                    }
                    KeyOutcome::Closed => return ListenerExit::EventsClosed,
                    KeyOutcome::Sent(_) | KeyOutcome::Unbound => {}
                }
            }
        }
    }

    /// Spawn [`listen`](Self::listen), registered with the startup barrier
    pub fn start<R>(
        self,
        input: R,
        shutdown: CancellationToken,
        barrier: &StartupBarrier,
    ) -> JoinHandle<ListenerExit>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        barrier.add(1);
        info!(keys = self.keys.len(), "Starting key listener");
        let handle = tokio::spawn(self.listen(input, shutdown));
        barrier.done();
        handle
    }
}
