mod interactive;
mod piped;

pub use interactive::{InteractiveSource, StaticSource, Ticker, CYCLE_KEY};
pub use piped::{CommandParser, PipedSource, MAX_COMMAND_LEN};

use crate::level::StateId;

/// One normalised input, whatever mode produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    /// Show this level.
    Show(StateId),
    /// Nothing pending right now.
    Tick,
    /// Stop the run loop.
    Shutdown,
}

pub trait CommandSource {
    /// Returns the next event without blocking.
    fn poll(&mut self) -> OverlayEvent;
}

impl<S: CommandSource + ?Sized> CommandSource for Box<S> {
    fn poll(&mut self) -> OverlayEvent {
        (**self).poll()
    }
}
