//! Document-space geometry and the coordinate transform to raster pixels.
//!
//! Document coordinates are PDF-native: 72 units per inch, origin at the
//! top-left of the page, y growing downward (the pdfium-facing code in
//! [`crate::pipeline::detect`] flips pdfium's bottom-up axis before
//! constructing a [`Rect`], so everything downstream of detection shares
//! one orientation). Rendering at `dpi` scales every coordinate by
//! `dpi / 72.0`; pixel coordinates truncate, so the mapping is linear and
//! reversible up to truncation.

/// An axis-aligned rectangle in document space (72 DPI, top-down y).
///
/// Invariant: `x0 < x1` and `y0 < y1` for every rectangle produced by the
/// detector; [`Rect::new`] normalises swapped corners to keep it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Build a rectangle from two corners, normalising their order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Whether `other` lies entirely within this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Whether this rectangle intersects `other` (shared edges count).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// This rectangle grown by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Rect {
        Rect {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    /// Map to pixel coordinates at the given scale, truncating each
    /// coordinate: `(⌊x0·s⌋, ⌊y0·s⌋, ⌊x1·s⌋, ⌊y1·s⌋)`.
    ///
    /// Negative coordinates clamp to zero — a bbox can poke slightly off
    /// the page after detector rounding, but a pixel crop cannot.
    pub fn to_pixels(&self, scale: f32) -> PixelRect {
        let px = |v: f32| (v * scale).max(0.0) as u32;
        PixelRect {
            x0: px(self.x0),
            y0: px(self.y0),
            x1: px(self.x1),
            y1: px(self.y1),
        }
    }
}

/// A rectangle in raster pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Clamp to a bitmap of `max_width` × `max_height` pixels.
    pub fn clamped(&self, max_width: u32, max_height: u32) -> PixelRect {
        PixelRect {
            x0: self.x0.min(max_width),
            y0: self.y0.min(max_height),
            x1: self.x1.min(max_width),
            y1: self.y1.min(max_height),
        }
    }
}

/// The scale factor used when rendering at `dpi` (document space is 72 DPI).
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_swapped_corners() {
        let r = Rect::new(100.0, 300.0, 50.0, 200.0);
        assert_eq!(r, Rect::new(50.0, 200.0, 100.0, 300.0));
        assert!(r.x0 < r.x1 && r.y0 < r.y1);
    }

    #[test]
    fn mapping_truncates_each_coordinate() {
        // scale = 200/72; every coordinate is ⌊coord·s⌋.
        let s = scale_for_dpi(200);
        let r = Rect::new(100.0, 200.0, 300.5, 401.9);
        let p = r.to_pixels(s);
        assert_eq!(p.x0, (100.0 * s) as u32);
        assert_eq!(p.y0, (200.0 * s) as u32);
        assert_eq!(p.x1, (300.5 * s) as u32);
        assert_eq!(p.y1, (401.9 * s) as u32);
    }

    #[test]
    fn mapping_at_unit_scale_is_identity_up_to_truncation() {
        let r = Rect::new(10.7, 20.2, 330.9, 440.0);
        let p = r.to_pixels(1.0);
        assert_eq!((p.x0, p.y0, p.x1, p.y1), (10, 20, 330, 440));
    }

    #[test]
    fn mapping_is_linear() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        let p2 = r.to_pixels(2.0);
        let p4 = r.to_pixels(4.0);
        assert_eq!(p4.x0, p2.x0 * 2);
        assert_eq!(p4.y1, p2.y1 * 2);
    }

    #[test]
    fn negative_coordinates_clamp_to_zero() {
        let r = Rect::new(-3.0, -1.5, 10.0, 10.0);
        let p = r.to_pixels(2.0);
        assert_eq!((p.x0, p.y0), (0, 0));
    }

    #[test]
    fn pixel_rect_clamps_to_bitmap() {
        let p = PixelRect {
            x0: 10,
            y0: 10,
            x1: 5000,
            y1: 5000,
        };
        let c = p.clamped(1700, 2200);
        assert_eq!((c.x1, c.y1), (1700, 2200));
        assert_eq!(c.width(), 1690);
    }

    #[test]
    fn union_and_intersects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 20.0, 20.0);
        assert!(a.intersects(&b));
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 20.0, 20.0));
        let far = Rect::new(100.0, 100.0, 110.0, 110.0);
        assert!(!a.intersects(&far));
    }
}
