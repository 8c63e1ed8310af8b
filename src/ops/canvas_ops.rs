// ============================================================================
// CANVAS-LEVEL OPERATIONS — crop
// ============================================================================

use image::{RgbaImage, imageops};

use crate::canvas::Region;

/// Crop to the rectangle `(x, y, w, h)`, clamped to the image.
///
/// Returns `None` when the rectangle does not overlap the image at all.
pub fn crop(image: &RgbaImage, x: i32, y: i32, w: u32, h: u32) -> Option<RgbaImage> {
    let region = Region::clamped_rect(x, y, w, h, image.width(), image.height());
    if region.is_empty() {
        return None;
    }
    Some(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}
