use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::{debug, warn};

use crate::api::StudyApi;
use crate::session::{SessionReply, SessionRequest};
use crate::stats::{StatsReply, StatsRequest};

/// Unified event type consumed by the app runner
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    Session(SessionReply),
    Stats(StatsReply),
}

pub fn event_channel() -> (Sender<AppEvent>, Receiver<AppEvent>) {
    mpsc::channel()
}

/// Source of app events (keyboard, resize, backend replies)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source: terminal input read on a background thread,
/// merged with whatever else is sent on the same channel
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new(tx: Sender<AppEvent>, rx: Receiver<AppEvent>) -> Self {
        thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(AppEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "terminal input reader stopped");
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

/// Runs backend calls off the UI thread. Each request gets its own worker
/// thread and posts exactly one reply event back on the app channel.
#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn StudyApi>,
    tx: Sender<AppEvent>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn StudyApi>, tx: Sender<AppEvent>) -> Self {
        Self { api, tx }
    }

    pub fn session(&self, request: SessionRequest) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        debug!(?request, "dispatching session request");
        thread::spawn(move || {
            let reply = request.execute(api.as_ref());
            if tx.send(AppEvent::Session(reply)).is_err() {
                debug!("event loop gone, dropping session reply");
            }
        });
    }

    pub fn stats(&self, request: StatsRequest) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let reply = request.execute(api.as_ref());
            if tx.send(AppEvent::Stats(reply)).is_err() {
                debug!("event loop gone, dropping stats reply");
            }
        });
    }
}
