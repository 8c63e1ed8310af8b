// ============================================================================
// PATCH SEARCH — brute-force scan for the flattest nearby source patch
// ============================================================================
//
// Every integer offset in the square [-r, r]² around the target is tried.
// A candidate must lie fully inside the image. Candidates are ranked by
// their own internal colour spread (sum of absolute deviation from the
// patch mean); the target's content is never looked at. The first strictly
// lowest score wins, so results are deterministic for a given scan order.
// ============================================================================

use crate::canvas::{PatchWindow, PixelBuffer};

/// Sum of per-channel absolute deviation from the patch mean. Lower is
/// flatter.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct PatchScore(pub f64);

/// Winning source patch from [`find_best_patch`].
#[derive(Clone, Debug)]
pub struct PatchCandidate {
    /// Top-left corner of the source patch.
    pub x: i32,
    pub y: i32,
    pub score: PatchScore,
    pub window: PatchWindow,
}

/// Score a window by how uniform its colour is (R, G, B only).
///
/// Returns `None` for a zero-sample window.
pub fn compute_patch_score(window: &PatchWindow) -> Option<PatchScore> {
    if window.is_empty() {
        return None;
    }
    let count = window.len() as f64;
    let (mut mr, mut mg, mut mb) = (0.0f64, 0.0f64, 0.0f64);
    for s in &window.samples {
        mr += s[0] as f64;
        mg += s[1] as f64;
        mb += s[2] as f64;
    }
    mr /= count;
    mg /= count;
    mb /= count;

    let score = window
        .samples
        .iter()
        .map(|s| (s[0] as f64 - mr).abs() + (s[1] as f64 - mg).abs() + (s[2] as f64 - mb).abs())
        .sum();
    Some(PatchScore(score))
}

/// True when a `size × size` patch at `(x, y)` is acceptable as a source.
///
/// The right and bottom edges use `>=`, so a patch touching the last column
/// or row is rejected as well.
#[inline]
fn is_source_in_bounds(x: i64, y: i64, size: i64, w: i64, h: i64) -> bool {
    !(x < 0 || y < 0 || x + size >= w || y + size >= h)
}

/// Offsets `d` in `[-r, r]` with `0 <= t + d` and `t + d + size < limit`.
/// Empty (`lo > hi`) when none qualify.
fn offset_range(t: i64, r: i64, size: i64, limit: i64) -> (i64, i64) {
    let lo = (-r).max(-t);
    let hi = r.min(limit - size - 1 - t);
    (lo, hi)
}

/// Scan `(2 * search_radius + 1)²` offsets around `(target_x, target_y)` and
/// return the flattest fully in-bounds `patch_size` patch.
///
/// `(target_x, target_y)` and the returned `(x, y)` are both top-left
/// corners. Scan order is `dx` outer, `dy` inner, both ascending from
/// `-search_radius`. `None` when no offset survives the bounds filter.
pub fn find_best_patch<B: PixelBuffer + ?Sized>(
    buffer: &B,
    target_x: i32,
    target_y: i32,
    patch_size: u32,
    search_radius: i32,
) -> Option<PatchCandidate> {
    if patch_size == 0 || search_radius < 0 {
        return None;
    }
    let (w, h) = (buffer.width() as i64, buffer.height() as i64);
    let size = patch_size as i64;

    // Offsets that cannot pass the bounds check are never visited. The
    // surviving ranges keep their ascending order.
    let r = search_radius as i64;
    let (dx_lo, dx_hi) = offset_range(target_x as i64, r, size, w);
    let (dy_lo, dy_hi) = offset_range(target_y as i64, r, size, h);

    let mut best: Option<PatchCandidate> = None;
    for dx in dx_lo..=dx_hi {
        for dy in dy_lo..=dy_hi {
            let cx = target_x as i64 + dx;
            let cy = target_y as i64 + dy;
            if !is_source_in_bounds(cx, cy, size, w, h) {
                continue;
            }
            // in-bounds above, so these fit i32
            let (cx, cy) = (cx as i32, cy as i32);
            let window = buffer.extract(cx, cy, patch_size);
            let Some(score) = compute_patch_score(&window) else {
                continue;
            };
            let improves = best.as_ref().is_none_or(|b| score.0 < b.score.0);
            if improves {
                best = Some(PatchCandidate { x: cx, y: cy, score, window });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn noisy(w: u32, h: u32) -> RgbaImage {
        // deterministic hash noise
        RgbaImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_mul(73) ^ y.wrapping_mul(151)).wrapping_mul(2654435761) >> 24;
            Rgba([v as u8, (v * 3) as u8, (v * 7) as u8, 255])
        })
    }

    #[test]
    fn uniform_window_scores_zero() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([40, 80, 120, 255]));
        let score = compute_patch_score(&img.extract(1, 1, 4)).unwrap();
        assert_eq!(score, PatchScore(0.0));
    }

    #[test]
    fn score_ignores_alpha() {
        let img = RgbaImage::from_fn(4, 4, |x, _| Rgba([10, 10, 10, (x * 60) as u8]));
        let score = compute_patch_score(&img.extract(0, 0, 4)).unwrap();
        assert_eq!(score.0, 0.0);
    }

    #[test]
    fn score_matches_hand_computation() {
        // two pixels: 0 and 10 on red → mean 5 → |−5| + |5| = 10
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([10, 0, 0, 255]));
        let win = img.extract(0, 0, 2);
        assert_eq!(win.len(), 2);
        assert_eq!(compute_patch_score(&win), Some(PatchScore(10.0)));
    }

    #[test]
    fn empty_window_has_no_score() {
        let img = RgbaImage::new(4, 4);
        assert_eq!(compute_patch_score(&img.extract(10, 10, 3)), None);
    }

    #[test]
    fn candidates_never_leave_the_image() {
        let img = noisy(24, 18);
        for &(tx, ty) in &[(0, 0), (20, 14), (-4, 9), (11, -2), (17, 3)] {
            for size in [2u32, 5, 8] {
                if let Some(c) = find_best_patch(&img, tx, ty, size, 6) {
                    assert!(c.x >= 0 && c.y >= 0);
                    assert!(c.x as u32 + size < 24);
                    assert!(c.y as u32 + size < 18);
                    assert!(c.window.is_full());
                }
            }
        }
    }

    #[test]
    fn last_row_and_column_are_rejected() {
        // 6×6 image, 3×3 patch: the only legal top-lefts are 0..=2
        let img = noisy(6, 6);
        let c = find_best_patch(&img, 3, 3, 3, 0);
        assert!(c.is_none());
        let c = find_best_patch(&img, 2, 2, 3, 0).unwrap();
        assert_eq!((c.x, c.y), (2, 2));
    }

    #[test]
    fn no_candidate_when_everything_is_out_of_bounds() {
        let img = noisy(10, 10);
        assert!(find_best_patch(&img, -5, -5, 10, 3).is_none());
        assert!(find_best_patch(&img, 0, 0, 10, 3).is_none());
        assert!(find_best_patch(&img, 0, 0, 0, 3).is_none());
        assert!(find_best_patch(&img, 2, 2, 3, -1).is_none());
    }

    #[test]
    fn first_strict_minimum_wins_ties() {
        // flat image: every candidate scores 0, so the first scanned wins
        let img = RgbaImage::from_pixel(20, 20, Rgba([50, 50, 50, 255]));
        let c = find_best_patch(&img, 8, 8, 4, 3).unwrap();
        assert_eq!((c.x, c.y), (5, 5));

        // clip the scan at the left edge: first legal dx is -2
        let c = find_best_patch(&img, 2, 8, 4, 3).unwrap();
        assert_eq!((c.x, c.y), (0, 5));
    }

    #[test]
    fn picks_the_flat_patch_over_noise() {
        let mut img = noisy(30, 30);
        for y in 0..30 {
            for x in 20..30 {
                img.put_pixel(x, y, Rgba([200, 100, 50, 255]));
            }
        }
        let c = find_best_patch(&img, 12, 10, 5, 10).unwrap();
        assert!(c.x >= 20, "picked x={}", c.x);
        assert_eq!(c.score, PatchScore(0.0));
    }

    #[test]
    fn huge_radius_matches_covering_radius() {
        // 20 already reaches every legal top-left of a 3×3 patch in 14×12
        let img = noisy(14, 12);
        let near = find_best_patch(&img, 5, 4, 3, 20).unwrap();
        let far = find_best_patch(&img, 5, 4, 3, i32::MAX).unwrap();
        assert_eq!((far.x, far.y, far.score), (near.x, near.y, near.score));
        assert!(find_best_patch(&img, 5, 4, 12, i32::MAX).is_none());
    }

    #[test]
    fn repeated_searches_agree() {
        let img = noisy(40, 40);
        let a = find_best_patch(&img, 15, 15, 6, 5).unwrap();
        let b = find_best_patch(&img, 15, 15, 6, 5).unwrap();
        assert_eq!((a.x, a.y, a.score), (b.x, b.y, b.score));
    }
}
