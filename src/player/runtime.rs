//! Player threads
//!
//! The player runs on its own thread, consuming the event queue. A ticker
//! thread posts [`PlayerEvent::Tick`] at a fixed rate so the clock is polled
//! while playing.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::machine::Player;
use super::types::{PlaybackState, PlayerCommand, PlayerEvent};
use crate::playback::AudioPrimitive;

/// Slowest allowed tick rate
pub const MIN_TICK_RATE: f64 = 4.0;

/// Interval between ticks for `rate_hz`, never slower than [`MIN_TICK_RATE`]
pub fn tick_interval(rate_hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / rate_hz.max(MIN_TICK_RATE))
}

/// Create the player's event queue
pub fn event_channel() -> (Sender<PlayerEvent>, Receiver<PlayerEvent>) {
    channel::unbounded()
}

/// Handle events until [`PlayerEvent::Shutdown`] or the queue closes
pub fn run_event_loop<A: AudioPrimitive>(mut player: Player<A>, events: Receiver<PlayerEvent>) {
    for event in events.iter() {
        let shutdown = matches!(event, PlayerEvent::Shutdown);
        player.handle(event);
        if shutdown {
            break;
        }
    }
    debug!("player event loop exited");
}

/// Owner-side handle to a running player
pub struct PlayerHandle {
    events: Sender<PlayerEvent>,
    snapshot: Arc<RwLock<PlaybackState>>,
    stop_ticker: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    /// Run `player` on a new thread
    ///
    /// `events`/`receiver` must be the queue the player was created with.
    pub fn spawn<A: AudioPrimitive + 'static>(
        player: Player<A>,
        events: Sender<PlayerEvent>,
        receiver: Receiver<PlayerEvent>,
        tick_rate: f64,
    ) -> io::Result<Self> {
        let snapshot = player.snapshot();
        let worker = thread::Builder::new()
            .name("player".into())
            .spawn(move || run_event_loop(player, receiver))?;

        let interval = tick_interval(tick_rate);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let ticks = events.clone();
        let ticker = thread::Builder::new()
            .name("player-tick".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if ticks.send(PlayerEvent::Tick).is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            })?;

        info!(tick_ms = interval.as_millis() as u64, "player running");
        Ok(Self {
            events,
            snapshot,
            stop_ticker: Some(stop_tx),
            worker: Some(worker),
            ticker: Some(ticker),
        })
    }

    /// Queue a command; false once the player has stopped
    pub fn send(&self, command: PlayerCommand) -> bool {
        self.events.send(PlayerEvent::Command(command)).is_ok()
    }

    /// Latest published state
    pub fn state(&self) -> PlaybackState {
        *self.snapshot.read()
    }

    /// Stop the ticker and the player thread and wait for both
    pub fn shutdown(&mut self) {
        self.stop_ticker.take();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        if let Some(worker) = self.worker.take() {
            let _ = self.events.send(PlayerEvent::Shutdown);
            let _ = worker.join();
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_never_below_minimum_rate() {
        assert_eq!(tick_interval(4.0), Duration::from_millis(250));
        assert_eq!(tick_interval(8.0), Duration::from_millis(125));
        assert_eq!(tick_interval(1.0), Duration::from_millis(250));
        assert_eq!(tick_interval(0.0), Duration::from_millis(250));
    }
}
