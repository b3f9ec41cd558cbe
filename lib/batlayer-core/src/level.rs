use std::fmt::{Display, Formatter};

/// Number of discrete levels an overlay can show.
pub const STATE_COUNT: usize = 5;

/// One of the [`STATE_COUNT`] battery levels. The index is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StateId(u8);

impl StateId {
    pub const EMPTY: StateId = StateId(0);

    pub fn new(index: usize) -> Option<Self> {
        (index < STATE_COUNT).then_some(Self(index as u8))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Charge level this state stands for, `index * 25`.
    pub fn percent(&self) -> u32 {
        self.0 as u32 * 25
    }

    /// The following state, wrapping back to the first after the last.
    pub fn next(&self) -> Self {
        Self(((self.index() + 1) % STATE_COUNT) as u8)
    }

    pub fn all() -> impl Iterator<Item = StateId> {
        (0..STATE_COUNT).map(|index| StateId(index as u8))
    }
}

impl Display for StateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.percent())
    }
}
