// ============================================================================
// ADJUSTMENT OPERATIONS — whole-image brightness / contrast / saturation
// ============================================================================
//
// Per-pixel linear remaps on R, G, B. Alpha is preserved.
// Rows are processed in parallel via rayon.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// HELPER: per-pixel transform
// ============================================================================

/// Apply a per-pixel transform in place.
/// `transform` receives (r, g, b, a) as f32 and returns (r, g, b, a) as f32;
/// results are rounded and saturated to 0..255.
pub fn apply_pixel_transform<F>(image: &mut RgbaImage, transform: F)
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let w = image.width() as usize;
    let h = image.height() as usize;
    if w == 0 || h == 0 { return; }
    let stride = w * 4;

    let raw: &mut [u8] = &mut **image;
    raw.par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let (nr, ng, nb, na) =
                transform(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32);
            px[0] = nr.round().clamp(0.0, 255.0) as u8;
            px[1] = ng.round().clamp(0.0, 255.0) as u8;
            px[2] = nb.round().clamp(0.0, 255.0) as u8;
            px[3] = na.round().clamp(0.0, 255.0) as u8;
        }
    });
}

// ============================================================================
// PARAMETERIZED OPERATIONS
// ============================================================================

/// Slider values for [`brightness_contrast_saturation`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentParams {
    /// Additive offset, in channel units (0 = no change).
    pub brightness: f32,
    /// Percent scale around mid-grey (100 = no change).
    pub contrast: f32,
    /// Percent scale around the pixel's grey average (100 = no change).
    pub saturation: f32,
}

impl Default for AdjustmentParams {
    fn default() -> Self {
        Self { brightness: 0.0, contrast: 100.0, saturation: 100.0 }
    }
}

impl AdjustmentParams {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Brightness, then contrast, then saturation, on one pixel.
#[inline]
pub fn adjust_pixel(r: f32, g: f32, b: f32, p: &AdjustmentParams) -> (f32, f32, f32) {
    let c = p.contrast / 100.0;
    let s = p.saturation / 100.0;

    let r = (r + p.brightness - 128.0) * c + 128.0;
    let g = (g + p.brightness - 128.0) * c + 128.0;
    let b = (b + p.brightness - 128.0) * c + 128.0;

    let avg = (r + g + b) / 3.0;
    (avg + (r - avg) * s, avg + (g - avg) * s, avg + (b - avg) * s)
}

/// Brightness/Contrast/Saturation adjustment.
/// `brightness`: additive offset (typ. -100..100)
/// `contrast`: percent, 100 = unchanged (typ. 0..200)
/// `saturation`: percent, 100 = unchanged, 0 = grey (typ. 0..200)
pub fn brightness_contrast_saturation(
    image: &mut RgbaImage,
    brightness: f32,
    contrast: f32,
    saturation: f32,
) {
    let params = AdjustmentParams { brightness, contrast, saturation };
    apply_adjustments(image, &params);
}

pub fn apply_adjustments(image: &mut RgbaImage, params: &AdjustmentParams) {
    if params.is_identity() { return; }
    let p = *params;
    apply_pixel_transform(image, move |r, g, b, a| {
        let (nr, ng, nb) = adjust_pixel(r, g, b, &p);
        (nr, ng, nb, a)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(7, 5, |x, y| Rgba([(x * 30) as u8, (y * 50) as u8, 77, (x * 10 + 5) as u8]))
    }

    #[test]
    fn defaults_are_identity() {
        let mut img = sample();
        let before = img.clone();
        brightness_contrast_saturation(&mut img, 0.0, 100.0, 100.0);
        assert_eq!(img, before);
        assert!(AdjustmentParams::default().is_identity());
    }

    #[test]
    fn brightness_adds_and_saturates() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 250, 128]));
        brightness_contrast_saturation(&mut img, 20.0, 100.0, 100.0);
        assert_eq!(img.get_pixel(1, 1).0, [30, 220, 255, 128]);
    }

    #[test]
    fn zero_contrast_collapses_to_mid_grey() {
        let mut img = sample();
        brightness_contrast_saturation(&mut img, 0.0, 0.0, 100.0);
        for p in img.pixels() {
            assert_eq!(&p.0[..3], &[128, 128, 128]);
        }
    }

    #[test]
    fn zero_saturation_greys_out() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([90, 30, 60, 255]));
        brightness_contrast_saturation(&mut img, 0.0, 100.0, 0.0);
        assert_eq!(img.get_pixel(0, 0).0, [60, 60, 60, 255]);
    }

    #[test]
    fn alpha_is_preserved() {
        let mut img = sample();
        let before = img.clone();
        brightness_contrast_saturation(&mut img, -40.0, 150.0, 180.0);
        for (a, b) in img.pixels().zip(before.pixels()) {
            assert_eq!(a.0[3], b.0[3]);
        }
    }
}
