use crate::commands::{CommandSource, OverlayEvent};
use crate::level::StateId;
use crate::platform::{Key, KeyInputImpl};
use log::{trace, warn};
use std::time::Duration;

/// Pressing this key (either case) shows the next level.
pub const CYCLE_KEY: char = 'c';

/// Fires once every `period`, counted in fixed steps of nominal loop time rather than wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    period_ms: u64,
    step_ms: u64,
    elapsed_ms: u64,
}

impl Ticker {
    pub fn new(period: Duration, step: Duration) -> Self {
        Self {
            period_ms: (period.as_millis() as u64).max(1),
            step_ms: step.as_millis() as u64,
            elapsed_ms: 0,
        }
    }

    /// Moves one step forward. Returns true when a full period has passed.
    pub fn advance(&mut self) -> bool {
        self.elapsed_ms += self.step_ms;
        if self.elapsed_ms >= self.period_ms {
            self.elapsed_ms -= self.period_ms;
            return true;
        }
        false
    }
}

/// Keyboard commands and the animation ticker. Both move the same cursor forward one level at a
/// time, wrapping after the last.
///
/// The cursor moves on every request, even when the engine then fails to load that level. A
/// broken icon is passed over on the next press instead of being retried forever.
pub struct InteractiveSource<K: KeyInputImpl> {
    keys: Option<K>,
    ticker: Option<Ticker>,
    cursor: StateId,
    tick_pending: bool,
}

impl<K: KeyInputImpl> InteractiveSource<K> {
    pub fn new(keys: Option<K>, ticker: Option<Ticker>, start: StateId) -> Self {
        Self {
            keys,
            ticker,
            cursor: start,
            tick_pending: false,
        }
    }

    /// The level most recently requested.
    pub fn cursor(&self) -> StateId {
        self.cursor
    }

    fn advance(&mut self) -> OverlayEvent {
        self.cursor = self.cursor.next();
        OverlayEvent::Show(self.cursor)
    }

    fn poll_keys(&mut self) -> Option<OverlayEvent> {
        let keys = self.keys.as_mut()?;
        match keys.poll_key() {
            Ok(Some(Key::Escape)) => Some(OverlayEvent::Shutdown),
            Ok(Some(Key::Char(c))) if c.eq_ignore_ascii_case(&CYCLE_KEY) => Some(self.advance()),
            Ok(Some(key)) => {
                trace!("Ignoring key {key:?}");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Keyboard polling stopped: {e}");
                self.keys = None;
                None
            }
        }
    }
}

impl<K: KeyInputImpl> CommandSource for InteractiveSource<K> {
    fn poll(&mut self) -> OverlayEvent {
        if let Some(ticker) = self.ticker.as_mut() {
            if ticker.advance() {
                self.tick_pending = true;
            }
        }

        if let Some(event) = self.poll_keys() {
            return event;
        }

        if self.tick_pending {
            self.tick_pending = false;
            return self.advance();
        }

        OverlayEvent::Tick
    }
}

/// Produces nothing. The display stays as it is until a signal or the timeout ends the run.
#[derive(Debug, Default)]
pub struct StaticSource;

impl CommandSource for StaticSource {
    fn poll(&mut self) -> OverlayEvent {
        OverlayEvent::Tick
    }
}
