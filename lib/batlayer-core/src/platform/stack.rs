use crate::platform::{
    Element, ElementContent, ElementHandle, IconImage, Position, Rgba16, Transaction,
};
use std::sync::Arc;

/// Bookkeeping shared by the compositor backends: handle allocation and the list of committed
/// elements, kept sorted by layer (stable, so equal layers paint in commit order).
#[derive(Debug)]
pub struct ElementStack {
    live: Vec<Element>,
    next_handle: ElementHandle,
    next_transaction: u64,
}

impl ElementStack {
    pub fn new() -> Self {
        Self {
            live: Vec::new(),
            next_handle: 1,
            next_transaction: 1,
        }
    }

    pub fn begin(&mut self) -> Transaction {
        let id = self.next_transaction;
        self.next_transaction += 1;
        Transaction::new(id)
    }

    pub fn stage_image(
        &mut self,
        transaction: &mut Transaction,
        image: &Arc<IconImage>,
        position: Position,
        layer: i32,
    ) -> ElementHandle {
        let handle = self.allocate();
        transaction.push(Element {
            handle,
            layer,
            position,
            content: ElementContent::Image(image.clone()),
        })
    }

    pub fn stage_fill(
        &mut self,
        transaction: &mut Transaction,
        color: Rgba16,
        layer: i32,
    ) -> ElementHandle {
        let handle = self.allocate();
        transaction.push(Element {
            handle,
            layer,
            position: Position::default(),
            content: ElementContent::Fill(color),
        })
    }

    /// Moves every element of the transaction onto the live list.
    pub fn commit(&mut self, transaction: Transaction) -> Vec<Element> {
        let committed = transaction.elements;
        self.live.extend(committed.iter().cloned());
        self.live.sort_by_key(|element| element.layer);
        committed
    }

    pub fn remove(&mut self, handle: ElementHandle) -> Option<Element> {
        let index = self.live.iter().position(|e| e.handle == handle)?;
        Some(self.live.remove(index))
    }

    pub fn live(&self) -> &[Element] {
        &self.live
    }

    fn allocate(&mut self) -> ElementHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Size;

    fn image() -> Arc<IconImage> {
        Arc::new(IconImage::new(Size::new(1, 1), vec![0, 0, 0, 255]))
    }

    #[test]
    fn test_commit_sorts_by_layer() {
        let mut stack = ElementStack::new();
        let mut transaction = stack.begin();
        let top = stack.stage_image(&mut transaction, &image(), Position::default(), 3002);
        let bottom = stack.stage_fill(&mut transaction, Rgba16(0x000F), 2999);
        stack.commit(transaction);

        let layers: Vec<ElementHandle> = stack.live().iter().map(|e| e.handle).collect();
        assert_eq!(layers, vec![bottom, top]);
    }

    #[test]
    fn test_handles_are_unique() {
        let mut stack = ElementStack::new();
        let mut first = stack.begin();
        let a = stack.stage_image(&mut first, &image(), Position::default(), 0);
        let mut second = stack.begin();
        let b = stack.stage_image(&mut second, &image(), Position::default(), 0);
        assert_ne!(a, b);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_remove_unknown_handle() {
        let mut stack = ElementStack::new();
        assert!(stack.remove(42).is_none());
    }
}
