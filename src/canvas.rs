// ============================================================================
// PIXEL BUFFER — windowed RGBA access over whatever raster the host displays
// ============================================================================
//
// The heal engine never touches a concrete image type. It sees a
// `PixelBuffer`: dimensions plus per-sample get/put. Everything else
// (window extraction, clamped write-back) is provided on top of those four
// methods, so an adapter only has to say how one sample is read and stored.
//
// Samples travel as `[f32; 4]` (R, G, B, A in 0..255 units). Blend overshoot
// is kept in the window; it is the backing store that decides what happens
// to out-of-range values when the window is written back.
// ============================================================================

use image::{Rgba, Rgba32FImage, RgbaImage};

/// One RGBA sample in 0..255 units. Values may leave that range while a
/// window is being blended.
pub type Sample = [f32; 4];

// ============================================================================
// REGION
// ============================================================================

/// Absolute pixel rectangle, already clamped to some image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Clamp the square `(x, y, size, size)` to `[0,img_w) × [0,img_h)`.
    ///
    /// A request that misses the image entirely yields an empty region
    /// anchored at the nearest corner.
    pub fn clamped(x: i32, y: i32, size: u32, img_w: u32, img_h: u32) -> Self {
        Self::clamped_rect(x, y, size, size, img_w, img_h)
    }

    /// Rectangular version of [`Region::clamped`].
    pub fn clamped_rect(x: i32, y: i32, w: u32, h: u32, img_w: u32, img_h: u32) -> Self {
        let start_x = (x as i64).clamp(0, img_w as i64);
        let start_y = (y as i64).clamp(0, img_h as i64);
        let end_x = (x as i64 + w as i64).clamp(start_x, img_w as i64);
        let end_y = (y as i64 + h as i64).clamp(start_y, img_h as i64);
        Self {
            x: start_x as u32,
            y: start_y as u32,
            width: (end_x - start_x) as u32,
            height: (end_y - start_y) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Smallest region covering both. Empty regions are ignored.
    pub fn union(&self, other: Region) -> Region {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Region { x: x0, y: y0, width: x1 - x0, height: y1 - y0 }
    }
}

// ============================================================================
// PATCH WINDOW
// ============================================================================

/// Snapshot of a square window of an image.
///
/// `origin` and `size` describe what was asked for; `region` is what was
/// actually inside the image. `samples` is row-major over `region`.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchWindow {
    /// Requested top-left corner (may be negative or past the image).
    pub origin: (i32, i32),
    /// Requested side length.
    pub size: u32,
    /// In-bounds part of the request, in absolute image coordinates.
    pub region: Region,
    pub samples: Vec<Sample>,
}

impl PatchWindow {
    /// Number of in-bounds samples. Can be anywhere from 0 to `size²`.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// A zero-sample window is unusable for scoring and blending.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when nothing was clipped.
    pub fn is_full(&self) -> bool {
        self.region.width == self.size && self.region.height == self.size
    }

    /// Sample at absolute image coordinates, if the window holds it.
    pub fn sample_at(&self, x: i64, y: i64) -> Option<&Sample> {
        let r = &self.region;
        if x < r.x as i64 || y < r.y as i64 {
            return None;
        }
        let lx = (x - r.x as i64) as u32;
        let ly = (y - r.y as i64) as u32;
        if lx >= r.width || ly >= r.height {
            return None;
        }
        self.samples.get((ly * r.width + lx) as usize)
    }

    /// Sample at an offset from the requested origin.
    pub fn sample_local(&self, lx: i64, ly: i64) -> Option<&Sample> {
        self.sample_at(self.origin.0 as i64 + lx, self.origin.1 as i64 + ly)
    }

    /// Iterate `(abs_x, abs_y, &sample)` over every held sample.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &Sample)> {
        let Region { x, y, width, .. } = self.region;
        self.samples.iter().enumerate().map(move |(i, s)| {
            let i = i as u32;
            (x + i % width, y + i / width, s)
        })
    }

    /// Iterate `(abs_x, abs_y, &mut sample)` over every held sample.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut Sample)> {
        let Region { x, y, width, .. } = self.region;
        self.samples.iter_mut().enumerate().map(move |(i, s)| {
            let i = i as u32;
            (x + i % width, y + i / width, s)
        })
    }
}

// ============================================================================
// PIXEL BUFFER TRAIT
// ============================================================================

/// Read/write access to the live image.
pub trait PixelBuffer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Read one in-bounds sample. Callers guarantee `x < width`, `y < height`.
    fn sample(&self, x: u32, y: u32) -> Sample;

    /// Store one in-bounds sample. The backing store decides how values
    /// outside 0..255 are represented.
    fn store(&mut self, x: u32, y: u32, sample: Sample);

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    /// Copy out the `size × size` window whose top-left is `(x, y)`.
    ///
    /// The request is clamped to the image; only in-bounds samples are
    /// returned, so the window may be partial or empty.
    fn extract(&self, x: i32, y: i32, size: u32) -> PatchWindow {
        let region = Region::clamped(x, y, size, self.width(), self.height());
        let mut samples = Vec::with_capacity(region.area());
        for py in region.y..region.y + region.height {
            for px in region.x..region.x + region.width {
                samples.push(self.sample(px, py));
            }
        }
        PatchWindow { origin: (x, y), size, region, samples }
    }

    /// Write `window` back with its requested origin placed at `(x, y)`.
    ///
    /// Samples that land outside the image are dropped. Writing a window at
    /// the origin it was extracted from restores exactly the pixels it read.
    fn write(&mut self, x: i32, y: i32, window: &PatchWindow) {
        let shift_x = x as i64 - window.origin.0 as i64;
        let shift_y = y as i64 - window.origin.1 as i64;
        let (w, h) = (self.width() as i64, self.height() as i64);
        let r = window.region;
        for (i, s) in window.samples.iter().enumerate() {
            let i = i as u32;
            let tx = (r.x + i % r.width) as i64 + shift_x;
            let ty = (r.y + i / r.width) as i64 + shift_y;
            if tx < 0 || ty < 0 || tx >= w || ty >= h {
                continue;
            }
            self.store(tx as u32, ty as u32, *s);
        }
    }
}

// -- 8-bit adapter ---------------------------------------------------------

/// 8-bit RGBA. Stores round to nearest and saturate to 0..255, the same way
/// a canvas' clamped byte array does.
impl PixelBuffer for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    #[inline]
    fn sample(&self, x: u32, y: u32) -> Sample {
        let p = self.get_pixel(x, y).0;
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    }

    #[inline]
    fn store(&mut self, x: u32, y: u32, s: Sample) {
        self.put_pixel(
            x,
            y,
            Rgba([quantize(s[0]), quantize(s[1]), quantize(s[2]), quantize(s[3])]),
        );
    }
}

#[inline(always)]
fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// -- float adapter ---------------------------------------------------------

/// Float RGBA in 0..255 units (not 0..1). Stores are exact, so blend
/// overshoot survives write-back.
impl PixelBuffer for Rgba32FImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    #[inline]
    fn sample(&self, x: u32, y: u32) -> Sample {
        self.get_pixel(x, y).0
    }

    #[inline]
    fn store(&mut self, x: u32, y: u32, s: Sample) {
        self.put_pixel(x, y, Rgba(s));
    }
}
