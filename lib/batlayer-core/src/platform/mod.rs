pub use common::*;
pub use headless::HeadlessCompositor;
pub use png_decoder::PngDecoder;
pub use stack::ElementStack;
pub use terminal::TerminalKeys;
pub use traits::*;

mod common;
mod headless;
pub mod mock;
mod png_decoder;
mod stack;
mod terminal;
mod traits;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod framebuffer;
        pub use framebuffer::{FramebufferCompositor, FramebufferGeometry, PixelFormat};
    }
}
