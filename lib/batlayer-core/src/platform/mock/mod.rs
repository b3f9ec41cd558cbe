use crate::icons::DecodeError;
use crate::platform::{
    CompositorImpl, Element, ElementContent, ElementHandle, ElementStack, IconImage,
    ImageDecoderImpl, Key, KeyInputImpl, PlatformResult, Position, Rgba16, Size, Transaction,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Begin(u64),
    AttachImage {
        handle: ElementHandle,
        position: Position,
        layer: i32,
    },
    AttachFill {
        handle: ElementHandle,
        color: Rgba16,
        layer: i32,
    },
    Submit(u64),
    Detach(ElementHandle),
    Close,
}

/// Records every call and keeps the committed elements, so tests can check what would be on
/// screen after each step.
#[derive(Debug)]
pub struct MockCompositor {
    stack: ElementStack,
    pub ops: Vec<MockOp>,
    pub fail_begin: bool,
    pub fail_submit: bool,
    pub closed: bool,
}

impl MockCompositor {
    pub fn new() -> Self {
        Self {
            stack: ElementStack::new(),
            ops: Vec::new(),
            fail_begin: false,
            fail_submit: false,
            closed: false,
        }
    }

    pub fn live(&self) -> &[Element] {
        self.stack.live()
    }

    pub fn live_images(&self) -> Vec<&Element> {
        self.live()
            .iter()
            .filter(|e| matches!(e.content, ElementContent::Image(_)))
            .collect()
    }

    pub fn live_fills(&self) -> Vec<&Element> {
        self.live()
            .iter()
            .filter(|e| matches!(e.content, ElementContent::Fill(_)))
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, MockOp::Begin(_)))
            .count()
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }
}

impl CompositorImpl for MockCompositor {
    fn begin(&mut self) -> PlatformResult<Transaction> {
        if self.fail_begin || self.closed {
            return Err("Mock compositor refused to begin".into());
        }
        let transaction = self.stack.begin();
        self.ops.push(MockOp::Begin(transaction.id));
        Ok(transaction)
    }

    fn attach_image(
        &mut self,
        transaction: &mut Transaction,
        image: &Arc<IconImage>,
        position: Position,
        layer: i32,
    ) -> PlatformResult<ElementHandle> {
        let handle = self.stack.stage_image(transaction, image, position, layer);
        self.ops.push(MockOp::AttachImage {
            handle,
            position,
            layer,
        });
        Ok(handle)
    }

    fn attach_fill(
        &mut self,
        transaction: &mut Transaction,
        color: Rgba16,
        layer: i32,
    ) -> PlatformResult<ElementHandle> {
        let handle = self.stack.stage_fill(transaction, color, layer);
        self.ops.push(MockOp::AttachFill {
            handle,
            color,
            layer,
        });
        Ok(handle)
    }

    fn submit(&mut self, transaction: Transaction) -> PlatformResult<()> {
        if self.fail_submit {
            return Err(format!("Mock compositor rejected transaction {}", transaction.id).into());
        }
        self.ops.push(MockOp::Submit(transaction.id));
        self.stack.commit(transaction);
        Ok(())
    }

    fn detach(&mut self, handle: ElementHandle) -> PlatformResult<()> {
        self.ops.push(MockOp::Detach(handle));
        self.stack.remove(handle);
        Ok(())
    }

    fn close(&mut self) -> PlatformResult<()> {
        self.ops.push(MockOp::Close);
        self.closed = true;
        Ok(())
    }
}

/// Hands out a small opaque image for every path and counts how often each path was decoded.
#[derive(Debug, Default)]
pub struct MockDecoder {
    decodes: RefCell<HashMap<PathBuf, usize>>,
    failing: HashSet<String>,
}

impl MockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every path whose file name is `file_name` fail to decode.
    pub fn fail_on(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }

    pub fn succeed_on(&mut self, file_name: &str) {
        self.failing.remove(file_name);
    }

    pub fn decode_count(&self, path: &Path) -> usize {
        self.decodes.borrow().get(path).copied().unwrap_or(0)
    }

    pub fn total_decodes(&self) -> usize {
        self.decodes.borrow().values().sum()
    }
}

impl ImageDecoderImpl for MockDecoder {
    fn decode(&self, path: &Path) -> Result<IconImage, DecodeError> {
        *self
            .decodes
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.failing.contains(&file_name) {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: "mock failure".to_string(),
            });
        }

        Ok(IconImage::new(Size::new(2, 2), vec![255; 16]))
    }
}

#[derive(Debug, Default)]
pub struct MockKeys {
    pending: VecDeque<Key>,
}

impl MockKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            pending: keys.into_iter().collect(),
        }
    }

    pub fn push(&mut self, key: Key) {
        self.pending.push_back(key);
    }
}

impl KeyInputImpl for MockKeys {
    fn poll_key(&mut self) -> PlatformResult<Option<Key>> {
        Ok(self.pending.pop_front())
    }
}
