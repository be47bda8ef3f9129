#![forbid(unsafe_code)]

//! Geometric primitives.

/// An element's on-screen box in CSS pixels, as reported by the layout engine.
///
/// Values are viewport-relative and fractional. They are snapshots: the host
/// page re-renders freely, so a rect is never reused across timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementRect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Rendered width.
    pub width: f64,
    /// Rendered height.
    pub height: f64,
}

impl ElementRect {
    /// Create a new rect.
    #[inline]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rendered area.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether the element occupies any space. NaN sizes count as hidden.
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Offset from `self` to `other`, i.e. how far `other` sits right of and
    /// below `self`.
    #[inline]
    pub fn offset_to(&self, other: &ElementRect) -> (f64, f64) {
        (other.left - self.left, other.top - self.top)
    }

    /// Sum of the absolute horizontal and vertical offsets between origins.
    #[inline]
    pub fn manhattan_distance(&self, other: &ElementRect) -> f64 {
        let (dx, dy) = self.offset_to(other);
        dx.abs() + dy.abs()
    }

    /// Move the rect by a delta.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.left + dx, self.top + dy, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_requires_both_dimensions() {
        assert!(ElementRect::new(0.0, 0.0, 1.0, 1.0).is_visible());
        assert!(!ElementRect::new(0.0, 0.0, 0.0, 10.0).is_visible());
        assert!(!ElementRect::new(0.0, 0.0, 10.0, 0.0).is_visible());
        assert!(!ElementRect::new(0.0, 0.0, f64::NAN, 10.0).is_visible());
    }

    #[test]
    fn offsets_and_distance() {
        let a = ElementRect::new(100.0, 100.0, 50.0, 50.0);
        let b = ElementRect::new(140.0, 70.0, 50.0, 50.0);
        assert_eq!(a.offset_to(&b), (40.0, -30.0));
        assert_eq!(a.manhattan_distance(&b), 70.0);
        assert_eq!(a.translated(40.0, -30.0), b);
    }

    #[test]
    fn area() {
        assert_eq!(ElementRect::new(3.0, 4.0, 10.0, 2.5).area(), 25.0);
    }
}
