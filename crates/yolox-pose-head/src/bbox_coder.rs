use nalgebra::Point2;
use yolox_pose_core::BBox;

use crate::PriorPoint;

/// YOLOX box parameterisation relative to a prior.
///
/// `reg = [dx, dy, log_w, log_h]` in stride units:
/// `center = prior + (dx, dy) * stride`, `size = exp(log_wh) * stride`.
#[derive(Clone, Copy, Debug, Default)]
pub struct YoloxBBoxCoder;

impl YoloxBBoxCoder {
    pub fn decode(&self, reg: &[f32; 4], prior: &PriorPoint) -> BBox {
        let s = prior.stride;
        let center = Point2::new(prior.center.x + reg[0] * s, prior.center.y + reg[1] * s);
        BBox::from_center_size(center, reg[2].exp() * s, reg[3].exp() * s)
    }

    /// Regression target reproducing `gt` under [`YoloxBBoxCoder::decode`].
    pub fn encode(&self, gt: &BBox, prior: &PriorPoint, eps: f32) -> [f32; 4] {
        let s = prior.stride;
        let c = gt.center();
        [
            (c.x - prior.center.x) / s,
            (c.y - prior.center.y) / s,
            (gt.width() / s + eps).ln(),
            (gt.height() / s + eps).ln(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zero_regression_gives_stride_sized_box() {
        let prior = PriorPoint::new(Point2::new(20.0, 28.0), 8.0);
        let b = YoloxBBoxCoder.decode(&[0.0; 4], &prior);
        assert_eq!(b, BBox::new(16.0, 24.0, 24.0, 32.0));
    }

    #[test]
    fn encode_inverts_decode() {
        let coder = YoloxBBoxCoder;
        let prior = PriorPoint::new(Point2::new(100.0, 60.0), 16.0);
        let gt = BBox::new(70.0, 20.0, 150.0, 140.0);
        let reg = coder.encode(&gt, &prior, 0.0);
        let back = coder.decode(&reg, &prior);
        for (a, b) in back.to_array().iter().zip(gt.to_array()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-3);
        }
    }
}
