use crate::icons::{DecodeError, IconCache};
use crate::level::StateId;
use crate::platform::{
    CompositorImpl, ElementHandle, ImageDecoderImpl, PlatformError, Position, Rgba16,
};
use log::{debug, info, trace};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Icon for {state} is unavailable: {source}")]
    ResourceUnavailable {
        state: StateId,
        source: DecodeError,
    },
    #[error("Could not start a compositor transaction: {0}")]
    TransactionUnavailable(#[source] PlatformError),
    #[error("Could not attach overlay: {0}")]
    AttachFailed(#[source] PlatformError),
    #[error("Compositor rejected the transaction: {0}")]
    CommitFailed(#[source] PlatformError),
    #[error("Could not detach overlay: {0}")]
    DetachFailed(#[source] PlatformError),
    #[error("Could not close the display: {0}")]
    CloseFailed(#[source] PlatformError),
}

impl TransitionError {
    /// Only a missing or broken icon leaves the screen in a known good state. Everything else
    /// means the compositor can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransitionError::ResourceUnavailable { .. })
    }
}

/// Where overlays go on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub offset: Position,
    pub base_layer: i32,
    pub background: Option<Rgba16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityRecord {
    /// The level on screen, `None` until the first transition succeeds.
    pub current: Option<StateId>,
    pub offset: Position,
    pub base_layer: i32,
}

impl VisibilityRecord {
    /// Saturates at the ends of the `i32` range rather than wrapping.
    pub fn layer_for(&self, state: StateId) -> i32 {
        self.base_layer.saturating_add(state.index() as i32)
    }

    /// One layer below the lowest overlay.
    pub fn background_layer(&self) -> i32 {
        self.base_layer.saturating_sub(1)
    }
}

#[derive(Debug)]
struct BackgroundFill {
    color: Rgba16,
    attachment: Option<ElementHandle>,
}

/// Swaps which icon is on screen.
///
/// Each change is one compositor transaction: the new icon is attached (together with the
/// background on the very first change) and committed, and only once the compositor confirms the
/// frame is the previous icon detached. Any committed frame therefore shows exactly one icon.
pub struct OverlayEngine<C: CompositorImpl, D: ImageDecoderImpl> {
    compositor: C,
    cache: IconCache<D>,
    visibility: VisibilityRecord,
    background: Option<BackgroundFill>,
    closed: bool,
}

impl<C: CompositorImpl, D: ImageDecoderImpl> OverlayEngine<C, D> {
    pub fn new(compositor: C, cache: IconCache<D>, placement: Placement) -> Self {
        Self {
            compositor,
            cache,
            visibility: VisibilityRecord {
                current: None,
                offset: placement.offset,
                base_layer: placement.base_layer,
            },
            background: placement
                .background
                .filter(|color| !color.is_transparent())
                .map(|color| BackgroundFill {
                    color,
                    attachment: None,
                }),
            closed: false,
        }
    }

    pub fn transition_to(&mut self, target: StateId) -> Result<(), TransitionError> {
        if self.visibility.current == Some(target) {
            trace!("Already showing {target}");
            return Ok(());
        }

        let offset = self.visibility.offset;
        let layer = self.visibility.layer_for(target);
        let previous = self.visibility.current;

        let resource = self.cache.get_or_load(target).map_err(|source| {
            TransitionError::ResourceUnavailable {
                state: target,
                source,
            }
        })?;

        let mut transaction = self
            .compositor
            .begin()
            .map_err(TransitionError::TransactionUnavailable)?;

        // The fill goes in with the first icon so the icon never appears without it.
        let mut staged_background = None;
        if let Some(background) = self.background.as_ref() {
            if background.attachment.is_none() {
                let handle = self
                    .compositor
                    .attach_fill(
                        &mut transaction,
                        background.color,
                        self.visibility.background_layer(),
                    )
                    .map_err(TransitionError::AttachFailed)?;
                staged_background = Some(handle);
            }
        }

        let handle = self
            .compositor
            .attach_image(&mut transaction, resource.image(), offset, layer)
            .map_err(TransitionError::AttachFailed)?;

        let transaction_id = transaction.id;
        self.compositor
            .submit(transaction)
            .map_err(TransitionError::CommitFailed)?;

        resource.set_attachment(handle);
        if let (Some(background), Some(handle)) = (self.background.as_mut(), staged_background) {
            background.attachment = Some(handle);
        }
        self.visibility.current = Some(target);

        if let Some(previous) = previous {
            self.detach_state(previous)?;
        }

        debug!(
            "Transaction {transaction_id}: {} -> {target} on layer {layer}",
            previous.map_or_else(|| "nothing".to_string(), |p| p.to_string())
        );
        Ok(())
    }

    /// Takes everything off the screen and closes the display. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), TransitionError> {
        if self.closed {
            return Ok(());
        }

        for state in StateId::all() {
            self.detach_state(state)?;
        }
        self.visibility.current = None;

        if let Some(background) = self.background.as_mut() {
            if let Some(handle) = background.attachment.take() {
                self.compositor
                    .detach(handle)
                    .map_err(TransitionError::DetachFailed)?;
            }
        }

        self.compositor
            .close()
            .map_err(TransitionError::CloseFailed)?;
        self.closed = true;
        info!("Overlay removed");
        Ok(())
    }

    fn detach_state(&mut self, state: StateId) -> Result<(), TransitionError> {
        let Some(resource) = self.cache.get_mut(state) else {
            return Ok(());
        };
        let Some(handle) = resource.take_attachment() else {
            return Ok(());
        };

        if let Err(e) = self.compositor.detach(handle) {
            // Still on screen, keep the handle so shutdown can try again.
            resource.set_attachment(handle);
            return Err(TransitionError::DetachFailed(e));
        }
        Ok(())
    }

    pub fn current(&self) -> Option<StateId> {
        self.visibility.current
    }

    pub fn visibility(&self) -> &VisibilityRecord {
        &self.visibility
    }

    /// Number of icons the engine believes are attached.
    pub fn visible_count(&self) -> usize {
        self.cache.attached().count()
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    pub fn cache(&self) -> &IconCache<D> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut IconCache<D> {
        &mut self.cache
    }
}
