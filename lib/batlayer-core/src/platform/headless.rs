use crate::platform::{
    CompositorImpl, ElementHandle, ElementStack, IconImage, PlatformResult, Position, Rgba16,
    Transaction,
};
use log::{debug, info};
use std::sync::Arc;

/// A compositor with no display behind it. Elements are tracked in memory and every operation is
/// logged, which is enough to drive the whole pipeline on machines without a framebuffer.
#[derive(Debug)]
pub struct HeadlessCompositor {
    stack: ElementStack,
    closed: bool,
}

impl HeadlessCompositor {
    pub fn new() -> Self {
        info!("Using headless compositor");
        Self {
            stack: ElementStack::new(),
            closed: false,
        }
    }
}

impl CompositorImpl for HeadlessCompositor {
    fn begin(&mut self) -> PlatformResult<Transaction> {
        if self.closed {
            return Err("Compositor is closed".into());
        }
        Ok(self.stack.begin())
    }

    fn attach_image(
        &mut self,
        transaction: &mut Transaction,
        image: &Arc<IconImage>,
        position: Position,
        layer: i32,
    ) -> PlatformResult<ElementHandle> {
        Ok(self.stack.stage_image(transaction, image, position, layer))
    }

    fn attach_fill(
        &mut self,
        transaction: &mut Transaction,
        color: Rgba16,
        layer: i32,
    ) -> PlatformResult<ElementHandle> {
        Ok(self.stack.stage_fill(transaction, color, layer))
    }

    fn submit(&mut self, transaction: Transaction) -> PlatformResult<()> {
        let id = transaction.id;
        let committed = self.stack.commit(transaction);
        for element in &committed {
            debug!(
                "Transaction {id}: element {} on layer {} at ({}, {})",
                element.handle, element.layer, element.position.x, element.position.y
            );
        }
        Ok(())
    }

    fn detach(&mut self, handle: ElementHandle) -> PlatformResult<()> {
        if self.stack.remove(handle).is_some() {
            debug!("Detached element {handle}");
        }
        Ok(())
    }

    fn close(&mut self) -> PlatformResult<()> {
        self.closed = true;
        debug!("Closed with {} live elements", self.stack.live().len());
        Ok(())
    }
}
