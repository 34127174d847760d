use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

/// 3x3 planar transform applied to keypoints by the geometric augmentations.
///
/// Affine augmentations (random affine, mosaic placement, resize) produce a
/// matrix whose last row is `[0, 0, 1]`; [`Homography::apply_affine`] uses
/// only the first two rows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    /// `x' = m00 x + m01 y + m02`, `y' = m10 x + m11 y + m12`.
    #[inline]
    pub fn apply_affine(&self, p: Point2<f32>) -> Point2<f32> {
        let (x, y) = (p.x as f64, p.y as f64);
        let m = &self.h;
        Point2::new(
            (m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)]) as f32,
            (m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)]) as f32,
        )
    }
}
