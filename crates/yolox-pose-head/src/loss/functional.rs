//! Element-wise loss functions.

use nalgebra::Point2;
use yolox_pose_core::{BBox, Visibility};

use super::OksMode;

/// Sigmoid cross-entropy on a logit, stable for large `|x|`.
#[inline]
pub fn bce_with_logits(x: f32, target: f32) -> f32 {
    x.max(0.0) - x * target + (-x.abs()).exp().ln_1p()
}

/// `1 - IoU²` with the IoU clamped to at least `eps`.
#[inline]
pub fn iou_loss_square(pred: &BBox, gt: &BBox, eps: f32) -> f32 {
    let iou = pred.iou(gt, eps).max(eps);
    1.0 - iou * iou
}

/// Summed absolute difference.
#[inline]
pub fn l1(pred: &[f32], target: &[f32]) -> f32 {
    pred.iter().zip(target).map(|(a, b)| (a - b).abs()).sum()
}

/// Object keypoint similarity of one instance.
///
/// `exp(-d² / (2·area·(2σ)²))` averaged over labelled keypoints. `None`
/// when the instance has no labelled keypoint.
pub fn oks(
    pred: &[Point2<f32>],
    gt: &[Point2<f32>],
    vis: &[Visibility],
    sigmas: &[f32],
    area: f32,
    eps: f32,
) -> Option<f32> {
    let mut num = 0.0_f32;
    let mut den = 0.0_f32;
    for (((p, g), v), s) in pred.iter().zip(gt).zip(vis).zip(sigmas) {
        if !v.is_labeled() {
            continue;
        }
        let variance = (2.0 * s) * (2.0 * s);
        let d2 = (p - g).norm_squared();
        num += (-d2 / (2.0 * variance * (area + eps))).exp();
        den += 1.0;
    }
    (den > 0.0).then(|| num / den)
}

/// Loss of one instance given its similarity, never negative.
#[inline]
pub fn oks_loss(oks: f32, mode: OksMode, eps: f32) -> f32 {
    let oks = oks.clamp(0.0, 1.0);
    match mode {
        OksMode::Linear => 1.0 - oks,
        OksMode::Log => -(oks.max(eps)).ln(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bce_matches_the_naive_formula() {
        for x in [-3.0_f32, -0.5, 0.0, 0.7, 4.0] {
            for t in [0.0_f32, 1.0] {
                let p = 1.0 / (1.0 + (-x).exp());
                let naive = -(t * p.ln() + (1.0 - t) * (1.0 - p).ln());
                assert_abs_diff_eq!(bce_with_logits(x, t), naive, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn bce_is_finite_for_extreme_logits() {
        assert!(bce_with_logits(1e4, 0.0).is_finite());
        assert!(bce_with_logits(-1e4, 1.0).is_finite());
        assert!(bce_with_logits(60.0, 1.0) < 1e-6);
    }

    #[test]
    fn iou_loss_is_zero_for_exact_boxes() {
        let b = BBox::new(0.0, 0.0, 4.0, 4.0);
        assert_abs_diff_eq!(iou_loss_square(&b, &b, 1e-16), 0.0, epsilon = 1e-6);
        let far = BBox::new(100.0, 100.0, 104.0, 104.0);
        assert_abs_diff_eq!(iou_loss_square(&b, &far, 1e-16), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn oks_is_one_for_exact_keypoints() {
        let pts = [Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)];
        let vis = [Visibility::Visible, Visibility::Occluded];
        let o = oks(&pts, &pts, &vis, &[0.025, 0.079], 100.0, 1e-8).unwrap();
        assert_abs_diff_eq!(o, 1.0, epsilon = 1e-6);
        assert_eq!(oks_loss(o, OksMode::Linear, 1e-8), 0.0);
        assert_eq!(oks_loss(o, OksMode::Log, 1e-8), 0.0);
    }

    #[test]
    fn oks_ignores_unlabelled_keypoints() {
        let gt = [Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)];
        let pred = [Point2::new(500.0, 500.0), Point2::new(10.0, 10.0)];
        let vis = [Visibility::Absent, Visibility::Visible];
        let o = oks(&pred, &gt, &vis, &[0.1, 0.1], 50.0, 1e-8).unwrap();
        assert_abs_diff_eq!(o, 1.0, epsilon = 1e-6);
        assert!(oks(&pred, &gt, &[Visibility::Absent; 2], &[0.1, 0.1], 50.0, 1e-8).is_none());
    }

    #[test]
    fn oks_decays_with_distance_and_grows_with_area() {
        let gt = [Point2::new(0.0, 0.0)];
        let vis = [Visibility::Visible];
        let near = oks(&[Point2::new(1.0, 0.0)], &gt, &vis, &[0.1], 100.0, 1e-8).unwrap();
        let far = oks(&[Point2::new(5.0, 0.0)], &gt, &vis, &[0.1], 100.0, 1e-8).unwrap();
        let far_big = oks(&[Point2::new(5.0, 0.0)], &gt, &vis, &[0.1], 10_000.0, 1e-8).unwrap();
        assert!(near > far);
        assert!(far_big > far);
        // d² = 1, (2σ)² = 0.04: exp(-1 / (2 * 0.04 * 100))
        assert_abs_diff_eq!(near, (-1.0_f32 / 8.0).exp(), epsilon = 1e-6);
    }

    #[test]
    fn log_mode_is_bounded() {
        assert!(oks_loss(0.0, OksMode::Log, 1e-8).is_finite());
        assert!(oks_loss(0.5, OksMode::Log, 1e-8) > oks_loss(0.5, OksMode::Linear, 1e-8));
    }
}
