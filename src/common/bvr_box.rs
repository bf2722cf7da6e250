use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixels, stored as `(left, top, width, height)`.
///
/// Coordinates are not clamped to the image; a box may hang over an edge.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BvrBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl BvrBox {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self { left, top, width, height }
    }

    /// Builds a box from a normalized `(cx, cy, w, h)` row scaled to an image of
    /// `img_width` x `img_height`. Each value is truncated toward zero.
    pub fn from_normalized_cxcywh(cx: f32, cy: f32, w: f32, h: f32, img_width: u32, img_height: u32) -> Self {
        let (iw, ih) = (img_width as f32, img_height as f32);
        Self {
            left: (cx * iw - w * iw / 2.0) as i32,
            top: (cy * ih - h * ih / 2.0) as i32,
            width: (w * iw) as i32,
            height: (h * ih) as i32,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }

    /// Area in square pixels. Degenerate boxes have zero area.
    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &BvrBox) -> i64 {
        let left = self.left.max(other.left) as i64;
        let right = self.right().min(other.right()) as i64;
        let top = self.top.max(other.top) as i64;
        let bottom = self.bottom().min(other.bottom()) as i64;
        (right - left).max(0) * (bottom - top).max(0)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &BvrBox) -> i64 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Intersection over union. Two boxes with an empty union have an IoU of 0.
    pub fn iou(&self, other: &BvrBox) -> f32 {
        let union = self.union(other);
        if union <= 0 {
            return 0.0;
        }
        (self.intersect(other) as f64 / union as f64) as f32
    }

    pub fn as_xy_wh(&self) -> (i32, i32, i32, i32) {
        (self.left, self.top, self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_center_box_maps_to_pixels() {
        let b = BvrBox::from_normalized_cxcywh(0.5, 0.5, 0.2, 0.2, 100, 100);
        assert_eq!(b, BvrBox::new(40, 40, 20, 20));
    }

    #[test]
    fn decoding_truncates_toward_zero() {
        // left = 0.01 * 100 - 0.05 * 100 / 2 = -1.5 -> -1
        let b = BvrBox::from_normalized_cxcywh(0.01, 0.5, 0.05, 0.1, 100, 100);
        assert_eq!(b.left, -1);
        assert_eq!(b.width, 5);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BvrBox::new(10, 10, 30, 40);
        assert!((b.iou(&b) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BvrBox::new(0, 0, 10, 10);
        let b = BvrBox::new(20, 20, 10, 10);
        assert_eq!(a.intersect(&b), 0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BvrBox::new(0, 0, 10, 10);
        let b = BvrBox::new(5, 0, 10, 10);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn zero_area_boxes_never_overlap() {
        let a = BvrBox::new(5, 5, 0, 0);
        assert_eq!(a.iou(&a), 0.0);
        assert!(a.is_empty());
    }
}
