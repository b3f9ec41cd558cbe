use crate::icons::DecodeError;
use crate::platform::{
    ElementHandle, IconImage, Key, PlatformResult, Position, Rgba16, Transaction,
};
use std::path::Path;
use std::sync::Arc;

/// The display surface overlays are composed onto.
///
/// All changes go through a [`Transaction`]: `begin`, any number of `attach_*` calls, then
/// `submit`. Nothing attached in a transaction may become visible before `submit` returns `Ok`,
/// and `submit` must not return until the new frame is live.
pub trait CompositorImpl {
    /// Starts a new transaction. Failure here means the display is unusable.
    fn begin(&mut self) -> PlatformResult<Transaction>;

    /// Adds an image element to the transaction at the given offset and layer. Higher layers
    /// paint over lower ones.
    fn attach_image(
        &mut self,
        transaction: &mut Transaction,
        image: &Arc<IconImage>,
        position: Position,
        layer: i32,
    ) -> PlatformResult<ElementHandle>;

    /// Adds a full screen solid fill to the transaction.
    fn attach_fill(
        &mut self,
        transaction: &mut Transaction,
        color: Rgba16,
        layer: i32,
    ) -> PlatformResult<ElementHandle>;

    /// Commits the transaction and blocks until it is on screen.
    fn submit(&mut self, transaction: Transaction) -> PlatformResult<()>;

    /// Removes a live element. Unknown handles are ignored.
    fn detach(&mut self, handle: ElementHandle) -> PlatformResult<()>;

    /// Releases the surface. Called once, after every element has been detached.
    fn close(&mut self) -> PlatformResult<()>;
}

pub trait ImageDecoderImpl {
    fn decode(&self, path: &Path) -> Result<IconImage, DecodeError>;
}

pub trait KeyInputImpl {
    /// Returns the next pending key press without blocking, if there is one.
    fn poll_key(&mut self) -> PlatformResult<Option<Key>>;
}
