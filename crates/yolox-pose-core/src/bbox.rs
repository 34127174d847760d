use nalgebra::{DMatrix, Point2};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in corner form `(x1, y1, x2, y2)`, image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from its center and size.
    pub fn from_center_size(center: Point2<f32>, width: f32, height: f32) -> Self {
        let hw = 0.5 * width;
        let hh = 0.5 * height;
        Self::new(center.x - hw, center.y - hh, center.x + hw, center.y + hh)
    }

    pub fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Box area; degenerate boxes report zero rather than a negative value.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        Point2::new(0.5 * (self.x1 + self.x2), 0.5 * (self.y1 + self.y2))
    }

    /// Finite coordinates and strictly positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite()) && self.width() > 0.0 && self.height() > 0.0
    }

    /// Strict interior test: points on the border are outside.
    #[inline]
    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x > self.x1 && p.x < self.x2 && p.y > self.y1 && p.y < self.y2
    }

    /// Intersection-over-union with the union clamped to at least `eps`.
    pub fn iou(&self, other: &BBox, eps: f32) -> f32 {
        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = iw * ih;
        let union = (self.area() + other.area() - inter).max(eps);
        let iou = inter / union;
        if iou.is_finite() {
            iou
        } else {
            0.0
        }
    }
}

/// Pairwise IoU matrix, `rows.len() x cols.len()`.
pub fn bbox_overlaps(rows: &[BBox], cols: &[BBox], eps: f32) -> DMatrix<f32> {
    DMatrix::from_fn(rows.len(), cols.len(), |i, j| rows[i].iou(&cols[j], eps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BBox::new(10.0, 10.0, 50.0, 50.0);
        assert_abs_diff_eq!(b.iou(&b, 1e-6), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        // inter 50, union 150
        assert_abs_diff_eq!(a.iou(&b, 1e-6), 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_boxes_do_not_produce_nan() {
        let a = BBox::new(5.0, 5.0, 5.0, 5.0);
        let b = BBox::new(f32::NAN, 0.0, 1.0, 1.0);
        assert_eq!(a.iou(&a, 1e-6), 0.0);
        assert_eq!(a.iou(&b, 1e-6), 0.0);
        assert!(!a.is_valid());
        assert!(!b.is_valid());
    }

    #[test]
    fn contains_excludes_border() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(Point2::new(5.0, 5.0)));
        assert!(!b.contains(Point2::new(0.0, 5.0)));
        assert!(!b.contains(Point2::new(10.0, 5.0)));
    }

    #[test]
    fn overlaps_matrix_has_expected_shape() {
        let rows = [BBox::new(0.0, 0.0, 1.0, 1.0); 3];
        let cols = [BBox::new(0.0, 0.0, 1.0, 1.0); 2];
        let m = bbox_overlaps(&rows, &cols, 1e-6);
        assert_eq!(m.shape(), (3, 2));
        assert_abs_diff_eq!(m[(2, 1)], 1.0, epsilon = 1e-6);
        assert_eq!(bbox_overlaps(&[], &cols, 1e-6).nrows(), 0);
    }
}
