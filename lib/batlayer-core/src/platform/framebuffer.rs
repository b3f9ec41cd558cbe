use crate::platform::{
    Bounds, CompositorImpl, Element, ElementContent, ElementHandle, ElementStack, IconImage,
    PlatformResult, Position, Rgba16, Size, Transaction,
};
use log::{debug, info, trace};
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32 bits per pixel, stored little endian as `B G R X`.
    Xrgb8888,
    /// 16 bits per pixel, little endian.
    Rgb565,
}

impl PixelFormat {
    fn from_bits_per_pixel(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::Xrgb8888),
            16 => Some(Self::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Xrgb8888 => 4,
            Self::Rgb565 => 2,
        }
    }

    fn decode(&self, bytes: &[u8]) -> [u8; 3] {
        match self {
            Self::Xrgb8888 => [bytes[2], bytes[1], bytes[0]],
            Self::Rgb565 => {
                let value = u16::from_le_bytes([bytes[0], bytes[1]]);
                let r = ((value >> 11) & 0x1F) as u8;
                let g = ((value >> 5) & 0x3F) as u8;
                let b = (value & 0x1F) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
            }
        }
    }

    /// Leaves the padding byte of `Xrgb8888` untouched.
    fn encode(&self, rgb: [u8; 3], out: &mut [u8]) {
        match self {
            Self::Xrgb8888 => {
                out[0] = rgb[2];
                out[1] = rgb[1];
                out[2] = rgb[0];
            }
            Self::Rgb565 => {
                let value = ((rgb[0] as u16 >> 3) << 11)
                    | ((rgb[1] as u16 >> 2) << 5)
                    | (rgb[2] as u16 >> 3);
                out[..2].copy_from_slice(&value.to_le_bytes());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferGeometry {
    pub size: Size,
    /// Bytes per row, including any padding.
    pub stride: usize,
    pub format: PixelFormat,
}

impl FramebufferGeometry {
    pub fn read(display: u32) -> PlatformResult<Self> {
        Self::parse(
            &read_attribute(display, "virtual_size")?,
            &read_attribute(display, "bits_per_pixel")?,
            &read_attribute(display, "stride")?,
        )
    }

    fn parse(virtual_size: &str, bits_per_pixel: &str, stride: &str) -> PlatformResult<Self> {
        let (width, height) = virtual_size
            .trim()
            .split_once(',')
            .ok_or_else(|| format!("Malformed virtual_size '{virtual_size}'"))?;
        let width: u32 = width
            .parse()
            .map_err(|_| format!("Malformed framebuffer width '{width}'"))?;
        let height: u32 = height
            .parse()
            .map_err(|_| format!("Malformed framebuffer height '{height}'"))?;

        let bits: u32 = bits_per_pixel
            .trim()
            .parse()
            .map_err(|_| format!("Malformed bits_per_pixel '{bits_per_pixel}'"))?;
        let format = PixelFormat::from_bits_per_pixel(bits)
            .ok_or_else(|| format!("Unsupported framebuffer depth: {bits} bits per pixel"))?;

        let stride: usize = stride
            .trim()
            .parse()
            .map_err(|_| format!("Malformed stride '{stride}'"))?;
        if stride < width as usize * format.bytes_per_pixel() {
            return Err(format!("Stride {stride} is too small for width {width}").into());
        }

        Ok(Self {
            size: Size::new(width, height),
            stride,
            format,
        })
    }

    pub fn byte_len(&self) -> usize {
        self.stride * self.size.height as usize
    }

    pub fn screen(&self) -> Bounds {
        Bounds::from_position(Position::default(), self.size)
    }
}

fn read_attribute(display: u32, name: &str) -> PlatformResult<String> {
    let path = PathBuf::from(format!("/sys/class/graphics/fb{display}/{name}"));
    fs::read_to_string(&path)
        .map(|value| value.trim().to_string())
        .map_err(|e| format!("Could not read {}: {e}", path.display()).into())
}

/// Draws overlays straight into a Linux framebuffer device (`/dev/fbN`).
///
/// The screen contents at open time are kept as the base image. Every change redraws only the
/// damaged rectangle: base first, then live elements in ascending layer order.
pub struct FramebufferCompositor {
    device: File,
    path: PathBuf,
    geometry: FramebufferGeometry,
    base: Vec<u8>,
    frame: Vec<u8>,
    stack: ElementStack,
    closed: bool,
}

impl FramebufferCompositor {
    pub fn open(display: u32) -> PlatformResult<Self> {
        let geometry = FramebufferGeometry::read(display)?;
        let path = PathBuf::from(format!("/dev/fb{display}"));
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| format!("Could not open {}: {e}", path.display()))?;

        let mut base = vec![0; geometry.byte_len()];
        device
            .read_exact_at(&mut base, 0)
            .map_err(|e| format!("Could not read {}: {e}", path.display()))?;
        let frame = base.clone();

        info!(
            "Opened {} ({}x{}, {:?})",
            path.display(),
            geometry.size.width,
            geometry.size.height,
            geometry.format
        );

        Ok(Self {
            device,
            path,
            geometry,
            base,
            frame,
            stack: ElementStack::new(),
            closed: false,
        })
    }

    fn redraw(&mut self, area: Bounds) -> PlatformResult<()> {
        let Some(area) = area.intersection(&self.geometry.screen()) else {
            return Ok(());
        };

        compose_area(
            &self.geometry,
            &self.base,
            &mut self.frame,
            self.stack.live(),
            area,
        );

        let bytes_per_pixel = self.geometry.format.bytes_per_pixel();
        for y in area.position.y..area.bottom() {
            let start =
                y as usize * self.geometry.stride + area.position.x as usize * bytes_per_pixel;
            let end = start + area.size.width as usize * bytes_per_pixel;
            self.device
                .write_all_at(&self.frame[start..end], start as u64)
                .map_err(|e| format!("Could not write {}: {e}", self.path.display()))?;
        }

        trace!(
            "Redrew {}x{} at ({}, {})",
            area.size.width,
            area.size.height,
            area.position.x,
            area.position.y
        );
        Ok(())
    }
}

impl CompositorImpl for FramebufferCompositor {
    fn begin(&mut self) -> PlatformResult<Transaction> {
        if self.closed {
            return Err(format!("{} is closed", self.path.display()).into());
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
        let screen = self.geometry.size;
        let committed = self.stack.commit(transaction);
        let damage = committed
            .iter()
            .fold(Bounds::default(), |damage, element| {
                damage.union(&element.bounds(screen))
            });

        self.redraw(damage)?;
        debug!("Submitted transaction {id} ({} elements)", committed.len());
        Ok(())
    }

    fn detach(&mut self, handle: ElementHandle) -> PlatformResult<()> {
        let Some(element) = self.stack.remove(handle) else {
            return Ok(());
        };

        self.redraw(element.bounds(self.geometry.size))?;
        debug!("Detached element {handle}");
        Ok(())
    }

    fn close(&mut self) -> PlatformResult<()> {
        if self.closed {
            return Ok(());
        }

        // Anything still live is dropped and the screen contents from open time are put back.
        let screen = self.geometry.screen();
        while let Some(handle) = self.stack.live().first().map(|e| e.handle) {
            self.stack.remove(handle);
        }
        self.redraw(screen)?;
        self.closed = true;
        info!("Closed {}", self.path.display());
        Ok(())
    }
}

fn blend(dst: [u8; 3], src: [u8; 4]) -> [u8; 3] {
    let alpha = src[3] as u32;
    let mix = |s: u8, d: u8| ((s as u32 * alpha + d as u32 * (255 - alpha) + 127) / 255) as u8;
    [mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2])]
}

/// Recomputes `area` of `frame` from `base` plus `elements`, which must be sorted by layer.
pub(crate) fn compose_area(
    geometry: &FramebufferGeometry,
    base: &[u8],
    frame: &mut [u8],
    elements: &[Element],
    area: Bounds,
) {
    let Some(area) = area.intersection(&geometry.screen()) else {
        return;
    };
    let bytes_per_pixel = geometry.format.bytes_per_pixel();

    for y in area.position.y..area.bottom() {
        for x in area.position.x..area.right() {
            let offset = y as usize * geometry.stride + x as usize * bytes_per_pixel;
            let pixel = offset..offset + bytes_per_pixel;
            let mut rgb = geometry.format.decode(&base[pixel.clone()]);

            for element in elements {
                let src = match &element.content {
                    ElementContent::Fill(color) => color.to_rgba8(),
                    ElementContent::Image(image) => {
                        let ex = x as i64 - element.position.x as i64;
                        let ey = y as i64 - element.position.y as i64;
                        if ex < 0
                            || ey < 0
                            || ex >= image.size.width as i64
                            || ey >= image.size.height as i64
                        {
                            continue;
                        }
                        image.pixel(ex as u32, ey as u32)
                    }
                };
                rgb = blend(rgb, src);
            }

            frame[pixel.clone()].copy_from_slice(&base[pixel.clone()]);
            geometry.format.encode(rgb, &mut frame[pixel]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: u32, height: u32) -> FramebufferGeometry {
        FramebufferGeometry {
            size: Size::new(width, height),
            stride: width as usize * 4,
            format: PixelFormat::Xrgb8888,
        }
    }

    fn pixel_at(geometry: &FramebufferGeometry, frame: &[u8], x: usize, y: usize) -> [u8; 3] {
        let offset = y * geometry.stride + x * 4;
        geometry.format.decode(&frame[offset..offset + 4])
    }

    fn solid_image(width: u32, height: u32, rgba: [u8; 4]) -> Arc<IconImage> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Arc::new(IconImage::new(Size::new(width, height), pixels))
    }

    #[test]
    fn test_parse_geometry() {
        let geometry = FramebufferGeometry::parse("1920,1080\n", "32\n", "7680\n").unwrap();
        assert_eq!(geometry.size, Size::new(1920, 1080));
        assert_eq!(geometry.stride, 7680);
        assert_eq!(geometry.format, PixelFormat::Xrgb8888);
        assert_eq!(geometry.byte_len(), 7680 * 1080);
    }

    #[test]
    fn test_parse_geometry_rejects_unsupported_depth() {
        assert!(FramebufferGeometry::parse("640,480", "24", "1920").is_err());
        assert!(FramebufferGeometry::parse("640x480", "32", "2560").is_err());
        assert!(FramebufferGeometry::parse("640,480", "32", "100").is_err());
    }

    #[test]
    fn test_rgb565_round_trip_of_primaries() {
        let format = PixelFormat::Rgb565;
        let mut out = [0u8; 2];
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255], [0, 0, 0]] {
            format.encode(rgb, &mut out);
            assert_eq!(format.decode(&out), rgb);
        }
    }

    #[test]
    fn test_compose_image_over_base() {
        let geometry = geometry(4, 2);
        let base = vec![0u8; geometry.byte_len()];
        let mut frame = base.clone();
        let elements = vec![Element {
            handle: 1,
            layer: 3000,
            position: Position::new(1, 0),
            content: ElementContent::Image(solid_image(2, 1, [255, 0, 0, 255])),
        }];

        compose_area(
            &geometry,
            &base,
            &mut frame,
            &elements,
            geometry.screen(),
        );

        assert_eq!(pixel_at(&geometry, &frame, 0, 0), [0, 0, 0]);
        assert_eq!(pixel_at(&geometry, &frame, 1, 0), [255, 0, 0]);
        assert_eq!(pixel_at(&geometry, &frame, 2, 0), [255, 0, 0]);
        assert_eq!(pixel_at(&geometry, &frame, 3, 0), [0, 0, 0]);
        assert_eq!(pixel_at(&geometry, &frame, 1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_compose_respects_layer_order_and_alpha() {
        let geometry = geometry(2, 1);
        let base = vec![0u8; geometry.byte_len()];
        let mut frame = base.clone();
        let elements = vec![
            Element {
                handle: 1,
                layer: 2999,
                position: Position::default(),
                content: ElementContent::Fill(Rgba16(0xFFFF)),
            },
            Element {
                handle: 2,
                layer: 3000,
                position: Position::default(),
                content: ElementContent::Image(solid_image(1, 1, [0, 0, 255, 0])),
            },
        ];

        compose_area(
            &geometry,
            &base,
            &mut frame,
            &elements,
            geometry.screen(),
        );

        // The transparent icon pixel leaves the white fill visible.
        assert_eq!(pixel_at(&geometry, &frame, 0, 0), [255, 255, 255]);
        assert_eq!(pixel_at(&geometry, &frame, 1, 0), [255, 255, 255]);
    }

    #[test]
    fn test_compose_ignores_images_at_extreme_offsets() {
        let geometry = geometry(2, 2);
        let base = vec![0u8; geometry.byte_len()];
        let mut frame = base.clone();
        let elements: Vec<Element> = [i32::MIN, i32::MAX]
            .into_iter()
            .enumerate()
            .map(|(handle, offset)| Element {
                handle: handle as ElementHandle,
                layer: 3000,
                position: Position::new(offset, offset),
                content: ElementContent::Image(solid_image(4, 4, [255, 255, 255, 255])),
            })
            .collect();

        compose_area(
            &geometry,
            &base,
            &mut frame,
            &elements,
            geometry.screen(),
        );
        assert_eq!(frame, base);
    }

    #[test]
    fn test_compose_without_elements_restores_base() {
        let geometry = geometry(2, 2);
        let base: Vec<u8> = (0..geometry.byte_len() as u8).collect();
        let mut frame = vec![0u8; geometry.byte_len()];

        compose_area(&geometry, &base, &mut frame, &[], geometry.screen());
        assert_eq!(frame, base);
    }

    #[test]
    fn test_blend_half_alpha() {
        assert_eq!(blend([0, 0, 0], [255, 255, 255, 128]), [128, 128, 128]);
        assert_eq!(blend([10, 20, 30], [255, 255, 255, 0]), [10, 20, 30]);
    }
}
