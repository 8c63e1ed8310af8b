// ============================================================================
// Spot healing — patch search + radial Gaussian blend
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::canvas::{PatchWindow, PixelBuffer, Region};
use crate::components::tools::BrushState;
use crate::ops::patch_match::{PatchScore, find_best_patch};

// -- Falloff kernels ---------------------------------------------------------

/// Radial weight profile used when blending the source patch in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendFalloff {
    /// `sigma = radius / 3`. Strong centre, fades out well inside the brush.
    #[default]
    Gaussian,
    /// `sigma = radius`. Nearly flat across the footprint.
    Wide,
}

impl BlendFalloff {
    pub fn label(&self) -> &'static str {
        match self {
            BlendFalloff::Gaussian => "Gaussian",
            BlendFalloff::Wide => "Wide",
        }
    }
    pub fn all() -> &'static [BlendFalloff] {
        &[BlendFalloff::Gaussian, BlendFalloff::Wide]
    }
    pub fn sigma(&self, radius: f32) -> f32 {
        match self {
            BlendFalloff::Gaussian => radius / 3.0,
            BlendFalloff::Wide => radius,
        }
    }
}

/// Blend weight for a sample `dist` pixels from the brush centre.
///
/// Not clamped: `intensity > 1` gives weights above 1, which push the result
/// past the source colour.
#[inline]
pub fn blend_weight(dist: f32, radius: f32, intensity: f32, falloff: BlendFalloff) -> f32 {
    let sigma = falloff.sigma(radius);
    (-(dist * dist) / (2.0 * sigma * sigma)).exp() * intensity
}

// -- Outcome -------------------------------------------------------------------

/// Why a heal left the image untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// `cursor_size / 2` is zero or negative.
    InvalidBrush,
    /// Pointer is not over the image.
    OutsideCanvas,
    /// Target window clipped down to nothing.
    EmptyWindow,
    /// Every candidate offset fell outside the image.
    NoCandidate,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::InvalidBrush => "invalid brush",
            SkipReason::OutsideCanvas => "outside canvas",
            SkipReason::EmptyWindow => "empty window",
            SkipReason::NoCandidate => "no candidate",
        }
    }
}

/// Details of a committed heal.
#[derive(Clone, Debug)]
pub struct HealReport {
    /// Pixels the target window covered (clamped).
    pub target: Region,
    /// Top-left corner of the source patch.
    pub source: (i32, i32),
    pub score: PatchScore,
    /// Samples inside the footprint that were blended.
    pub touched: usize,
    /// Target window as it was before blending; writing it back undoes
    /// the heal.
    pub before: PatchWindow,
}

#[derive(Clone, Debug)]
pub enum HealOutcome {
    Healed(HealReport),
    Skipped(SkipReason),
}

impl HealOutcome {
    pub fn is_healed(&self) -> bool {
        matches!(self, HealOutcome::Healed(_))
    }
    pub fn report(&self) -> Option<&HealReport> {
        match self {
            HealOutcome::Healed(r) => Some(r),
            HealOutcome::Skipped(_) => None,
        }
    }
}

// -- Blend ---------------------------------------------------------------------

/// Blend `source` into `target` around the nominal centre `(cx, cy)`.
///
/// Samples are matched by offset from each window's requested origin, so a
/// clipped target still lines up with the (always full) source. Only R, G,
/// B change; alpha is kept. Returns the number of samples blended.
pub fn blend_patch(
    target: &mut PatchWindow,
    source: &PatchWindow,
    cx: i32,
    cy: i32,
    radius: i32,
    brush: &BrushState,
) -> usize {
    let r = radius as f32;
    let affect_radius = r * brush.affected_area;
    let (ox, oy) = (target.origin.0 as i64, target.origin.1 as i64);
    let mut touched = 0usize;

    for (px, py, sample) in target.iter_mut() {
        let dx = (px as i64 - cx as i64) as f32;
        let dy = (py as i64 - cy as i64) as f32;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist >= affect_radius {
            continue;
        }
        let Some(src) = source.sample_local(px as i64 - ox, py as i64 - oy) else {
            continue;
        };
        let weight = blend_weight(dist, r, brush.blending_intensity, brush.falloff);
        for c in 0..3 {
            sample[c] = weight * src[c] + (1.0 - weight) * sample[c];
        }
        touched += 1;
    }
    touched
}

// -- Heal ------------------------------------------------------------------------

/// Heal the spot under `(x, y)` in place.
///
/// The target is the `2r × 2r` window with top-left `(x - r, y - r)` where
/// `r = cursor_size / 2`. The source search is addressed the same way, so
/// target and candidates share one corner convention. Nothing is written
/// unless the outcome is [`HealOutcome::Healed`].
pub fn heal_at<B: PixelBuffer + ?Sized>(
    buffer: &mut B,
    x: i32,
    y: i32,
    brush: &BrushState,
) -> HealOutcome {
    let radius = brush.radius();
    if radius <= 0 {
        return HealOutcome::Skipped(SkipReason::InvalidBrush);
    }
    if !buffer.contains(x, y) {
        return HealOutcome::Skipped(SkipReason::OutsideCanvas);
    }

    let size = (radius * 2) as u32;
    let (ox, oy) = (x.saturating_sub(radius), y.saturating_sub(radius));
    let mut target = buffer.extract(ox, oy, size);
    if target.is_empty() {
        return HealOutcome::Skipped(SkipReason::EmptyWindow);
    }

    let Some(candidate) = find_best_patch(&*buffer, ox, oy, size, brush.search_radius) else {
        return HealOutcome::Skipped(SkipReason::NoCandidate);
    };

    let before = target.clone();
    let touched = blend_patch(&mut target, &candidate.window, x, y, radius, brush);
    buffer.write(ox, oy, &target);

    HealOutcome::Healed(HealReport {
        target: target.region,
        source: (candidate.x, candidate.y),
        score: candidate.score,
        touched,
        before,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, Rgba32FImage, RgbaImage};

    fn brush(size: i32) -> BrushState {
        BrushState { cursor_size: size, search_radius: 3, ..BrushState::default() }
    }

    #[test]
    fn weight_is_intensity_at_centre() {
        assert_eq!(blend_weight(0.0, 5.0, 1.0, BlendFalloff::Gaussian), 1.0);
        assert_eq!(blend_weight(0.0, 5.0, 1.5, BlendFalloff::Gaussian), 1.5);
        assert_eq!(blend_weight(0.0, 5.0, 0.3, BlendFalloff::Wide), 0.3);
    }

    #[test]
    fn weight_falls_off_with_distance() {
        for falloff in BlendFalloff::all() {
            let mut prev = f32::INFINITY;
            for step in 0..50 {
                let w = blend_weight(step as f32 * 0.1, 5.0, 1.0, *falloff);
                assert!(w <= prev, "{} not monotonic at {}", falloff.label(), step);
                prev = w;
            }
        }
    }

    #[test]
    fn wide_falloff_is_flatter() {
        let g = blend_weight(3.0, 5.0, 1.0, BlendFalloff::Gaussian);
        let w = blend_weight(3.0, 5.0, 1.0, BlendFalloff::Wide);
        assert!(w > g);
    }

    #[test]
    fn zero_radius_is_a_no_op() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let before = img.clone();
        for size in [0, 1, -4] {
            let out = heal_at(&mut img, 5, 5, &brush(size));
            assert!(matches!(out, HealOutcome::Skipped(SkipReason::InvalidBrush)));
        }
        assert_eq!(img, before);
    }

    #[test]
    fn pointer_off_canvas_is_a_no_op() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let before = img.clone();
        for (x, y) in [(-1, 3), (3, -1), (10, 0), (0, 10)] {
            let out = heal_at(&mut img, x, y, &brush(4));
            assert!(matches!(out, HealOutcome::Skipped(SkipReason::OutsideCanvas)));
        }
        assert_eq!(img, before);
    }

    #[test]
    fn no_candidate_leaves_image_alone() {
        // brush as large as the image: no source can fit
        let mut img = RgbaImage::from_fn(10, 10, |x, y| Rgba([(x * 20) as u8, (y * 20) as u8, 0, 255]));
        let before = img.clone();
        let out = heal_at(&mut img, 5, 5, &brush(10));
        assert!(matches!(out, HealOutcome::Skipped(SkipReason::NoCandidate)));
        assert_eq!(img, before);
    }

    #[test]
    fn alpha_is_never_blended() {
        let mut img = RgbaImage::from_fn(30, 30, |x, _| {
            if x < 15 { Rgba([0, 0, 0, 10]) } else { Rgba([255, 255, 255, 200]) }
        });
        let before = img.clone();
        let out = heal_at(&mut img, 14, 14, &BrushState { search_radius: 10, ..brush(8) });
        assert!(out.is_healed());
        for (a, b) in img.pixels().zip(before.pixels()) {
            assert_eq!(a.0[3], b.0[3]);
        }
    }

    fn noise(x: u32, y: u32) -> f32 {
        ((x * 37 + y * 91) % 251) as f32
    }

    #[test]
    fn before_window_restores_the_image() {
        let mut img = RgbaImage::from_fn(32, 32, |x, y| {
            if x < 16 {
                Rgba([90, 90, 90, 255])
            } else {
                let v = noise(x, y) as u8;
                Rgba([v, v / 2, 255 - v, 255])
            }
        });
        let before = img.clone();
        let out = heal_at(&mut img, 22, 16, &BrushState { search_radius: 12, ..brush(10) });
        let report = out.report().unwrap();
        assert_eq!(report.source, (5, 0));
        assert_eq!(img.get_pixel(22, 16).0, [90, 90, 90, 255]);
        img.write(report.before.origin.0, report.before.origin.1, &report.before);
        assert_eq!(img, before);
    }

    fn split_float(right: f32) -> Rgba32FImage {
        let mut img = Rgba32FImage::from_fn(40, 40, |x, y| {
            if x >= 20 {
                Rgba([right, right, right, 255.0])
            } else {
                let v = noise(x, y);
                Rgba([v, v, v, 255.0])
            }
        });
        img.put_pixel(10, 10, Rgba([200.0, 200.0, 200.0, 255.0]));
        img
    }

    #[test]
    fn overshoot_survives_on_float_buffer() {
        let b = BrushState {
            cursor_size: 6,
            search_radius: 14,
            blending_intensity: 1.5,
            ..BrushState::default()
        };

        // 1.5 * 100 - 0.5 * 200 = 50
        let mut img = split_float(100.0);
        let out = heal_at(&mut img, 10, 10, &b);
        assert_eq!(out.report().map(|r| r.source), Some((20, 0)));
        let centre = img.get_pixel(10, 10).0;
        assert!((centre[0] - 50.0).abs() < 1e-3, "got {}", centre[0]);

        // 1.5 * 10 - 0.5 * 200 = -85, kept as is
        let mut dark = split_float(10.0);
        heal_at(&mut dark, 10, 10, &b);
        let centre = dark.get_pixel(10, 10).0;
        assert!((centre[0] + 85.0).abs() < 1e-3, "got {}", centre[0]);
    }
}
