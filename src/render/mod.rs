//! Frame presentation: a `minifb` preview window or a headless logger.

mod headless;
#[cfg(feature = "display-minifb")]
mod window;

pub use headless::HeadlessRenderer;
#[cfg(feature = "display-minifb")]
pub use window::WindowRenderer;

use crate::{
    pipeline::skeleton::Canvas,
    types::{Frame, Overlay},
};

/// Copies the frame and draws every hand skeleton onto the copy.
pub fn annotate(frame: &Frame, overlay: &Overlay) -> Vec<u8> {
    let mut rgba = frame.rgba.clone();
    let mut canvas = Canvas::new(&mut rgba, frame.width, frame.height);
    for hand in &overlay.hands {
        canvas.draw_hand(hand);
    }
    rgba
}

/// Packs RGBA8 into the `0RGB` words `minifb` expects.
pub fn to_0rgb(rgba: &[u8]) -> Vec<u32> {
    rgba.chunks_exact(4)
        .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32)
        .collect()
}
