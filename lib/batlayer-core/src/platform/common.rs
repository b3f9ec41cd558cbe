use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub struct PlatformError {
    pub error_type: PlatformErrorType,
    pub backtrace: Backtrace,
}

#[derive(Debug)]
pub enum PlatformErrorType {
    Unknown,
    Error(String),
    Io(std::io::Error),
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            PlatformErrorType::Unknown => write!(f, "unknown platform error"),
            PlatformErrorType::Error(message) => write!(f, "{message}"),
            PlatformErrorType::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.error_type {
            PlatformErrorType::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PlatformErrorType> for PlatformError {
    fn from(error_type: PlatformErrorType) -> Self {
        Self {
            error_type,
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<&str> for PlatformError {
    fn from(error: &str) -> Self {
        PlatformErrorType::Error(error.to_string()).into()
    }
}

impl From<String> for PlatformError {
    fn from(error: String) -> Self {
        PlatformErrorType::Error(error).into()
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(error: std::io::Error) -> Self {
        PlatformErrorType::Io(error).into()
    }
}

impl From<()> for PlatformError {
    fn from(_: ()) -> Self {
        PlatformErrorType::Unknown.into()
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Identifies one element on the compositor surface. Handles are never reused within a session.
pub type ElementHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub position: Position,
    pub size: Size,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            position: Position::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_position(position: Position, size: Size) -> Self {
        Self { position, size }
    }

    /// Exclusive right edge, clamped to the `i32` range.
    pub fn right(&self) -> i32 {
        clamp_i32(self.position.x as i64 + self.size.width as i64)
    }

    /// Exclusive bottom edge, clamped to the `i32` range.
    pub fn bottom(&self) -> i32 {
        clamp_i32(self.position.y as i64 + self.size.height as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.size.width == 0 || self.size.height == 0
    }

    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        let left = self.position.x.max(other.position.x);
        let top = self.position.y.max(other.position.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(Bounds::new(left, top, span(left, right), span(top, bottom)))
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let left = self.position.x.min(other.position.x);
        let top = self.position.y.min(other.position.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Bounds::new(left, top, span(left, right), span(top, bottom))
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn span(start: i32, end: i32) -> u32 {
    (end as i64 - start as i64).clamp(0, u32::MAX as i64) as u32
}

/// A 16 bit colour with 4 bits per channel, laid out as `0xRGBA`. `0x000F` is opaque black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba16(pub u16);

impl Rgba16 {
    /// Parses `000F` or `0x000F`.
    pub fn parse(value: &str) -> Option<Self> {
        let digits = value
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        u16::from_str_radix(digits, 16).ok().map(Self)
    }

    pub fn is_transparent(&self) -> bool {
        self.0 == 0
    }

    /// Expands each nibble to a full byte, `[r, g, b, a]`.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let nibble = |shift: u16| (((self.0 >> shift) & 0xF) as u8) * 17;
        [nibble(12), nibble(8), nibble(4), nibble(0)]
    }
}

/// A decoded icon, straight-alpha RGBA8 rows with no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconImage {
    pub size: Size,
    pub pixels: Vec<u8>,
}

impl IconImage {
    pub fn new(size: Size, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            size.width as usize * size.height as usize * 4
        );
        Self { size, pixels }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.size.width as usize + x as usize) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }
}

#[derive(Debug, Clone)]
pub enum ElementContent {
    Image(Arc<IconImage>),
    Fill(Rgba16),
}

/// An element waiting in a transaction, or live on the surface once committed.
#[derive(Debug, Clone)]
pub struct Element {
    pub handle: ElementHandle,
    pub layer: i32,
    pub position: Position,
    pub content: ElementContent,
}

impl Element {
    /// Fills have no intrinsic size and cover whatever area they are composed into.
    pub fn bounds(&self, screen: Size) -> Bounds {
        match &self.content {
            ElementContent::Image(image) => Bounds::from_position(self.position, image.size),
            ElementContent::Fill(_) => Bounds::from_position(Position::default(), screen),
        }
    }
}

/// Pending changes. Nothing in here is visible until the compositor accepts it in `submit`.
#[derive(Debug)]
pub struct Transaction {
    pub id: u64,
    pub elements: Vec<Element>,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            elements: Vec::new(),
        }
    }

    pub fn push(&mut self, element: Element) -> ElementHandle {
        let handle = element.handle;
        self.elements.push(element);
        handle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba16_parse() {
        assert_eq!(Rgba16::parse("000F"), Some(Rgba16(0x000F)));
        assert_eq!(Rgba16::parse("0x000F"), Some(Rgba16(0x000F)));
        assert_eq!(Rgba16::parse("0"), Some(Rgba16(0)));
        assert_eq!(Rgba16::parse("zz"), None);
        assert_eq!(Rgba16::parse("0x12345"), None);
    }

    #[test]
    fn test_rgba16_expand() {
        assert_eq!(Rgba16(0x000F).to_rgba8(), [0, 0, 0, 255]);
        assert_eq!(Rgba16(0xF00F).to_rgba8(), [255, 0, 0, 255]);
        assert_eq!(Rgba16(0x8421).to_rgba8(), [136, 68, 34, 17]);
        assert!(Rgba16(0).is_transparent());
    }

    #[test]
    fn test_bounds_intersection() {
        let a = Bounds::new(0, 0, 10, 10);
        let b = Bounds::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Bounds::new(5, 5, 5, 5)));

        let c = Bounds::new(10, 0, 5, 5);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_bounds_edges_at_extreme_offsets() {
        let far = Bounds::new(i32::MAX, i32::MAX, 64, 64);
        assert_eq!(far.right(), i32::MAX);
        assert_eq!(far.bottom(), i32::MAX);
        assert_eq!(far.intersection(&Bounds::new(0, 0, 1920, 1080)), None);

        let near = Bounds::new(i32::MIN, i32::MIN, 64, 64);
        assert_eq!(near.right(), i32::MIN + 64);
        assert_eq!(near.intersection(&Bounds::new(0, 0, 1920, 1080)), None);

        let both = near.union(&far);
        assert_eq!(both.position, Position::new(i32::MIN, i32::MIN));
        assert_eq!(both.size, Size::new(u32::MAX, u32::MAX));
    }

    #[test]
    fn test_bounds_union() {
        let a = Bounds::new(0, 0, 10, 10);
        let b = Bounds::new(20, 5, 10, 10);
        assert_eq!(a.union(&b), Bounds::new(0, 0, 30, 15));
        assert_eq!(Bounds::default().union(&b), b);
    }
}
