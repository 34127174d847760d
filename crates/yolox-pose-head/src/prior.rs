//! Anchor-point grids over the feature pyramid.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use yolox_pose_core::ImageShape;

/// One prediction location: its image-space center and pyramid stride.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorPoint {
    pub center: Point2<f32>,
    pub stride: f32,
}

impl PriorPoint {
    pub fn new(center: Point2<f32>, stride: f32) -> Self {
        Self { center, stride }
    }
}

/// Flattened priors of every pyramid level: level-major, then row-major.
///
/// `offset` is the fraction of a cell added to the grid index, so `0.5`
/// places priors at cell centers.
pub fn grid_priors(featmap_sizes: &[(usize, usize)], strides: &[u32], offset: f32) -> Vec<PriorPoint> {
    let total: usize = featmap_sizes.iter().map(|(h, w)| h * w).sum();
    let mut out = Vec::with_capacity(total);
    for (&(h, w), &stride) in featmap_sizes.iter().zip(strides) {
        let s = stride as f32;
        for y in 0..h {
            for x in 0..w {
                out.push(PriorPoint::new(
                    Point2::new((x as f32 + offset) * s, (y as f32 + offset) * s),
                    s,
                ));
            }
        }
    }
    out
}

/// Feature-map sizes produced by a network input of `shape`.
pub fn featmap_sizes(shape: ImageShape, strides: &[u32]) -> Vec<(usize, usize)> {
    strides
        .iter()
        .map(|&s| {
            let s = s.max(1) as usize;
            (shape.height.div_ceil(s), shape.width.div_ceil(s))
        })
        .collect()
}

/// Priors for an input image of `shape`.
pub fn priors_for_image(shape: ImageShape, strides: &[u32], offset: f32) -> Vec<PriorPoint> {
    grid_priors(&featmap_sizes(shape, strides), strides, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolox_640_grid_has_8400_priors() {
        let priors = priors_for_image(ImageShape::new(640, 640), &[8, 16, 32], 0.5);
        assert_eq!(priors.len(), 80 * 80 + 40 * 40 + 20 * 20);
        assert_eq!(priors[0].center, Point2::new(4.0, 4.0));
        assert_eq!(priors[1].center, Point2::new(12.0, 4.0));
        assert_eq!(priors[80].center, Point2::new(4.0, 12.0));
        let first_p4 = priors[6400];
        assert_eq!(first_p4.stride, 16.0);
        assert_eq!(first_p4.center, Point2::new(8.0, 8.0));
    }

    #[test]
    fn non_divisible_sizes_round_up() {
        assert_eq!(
            featmap_sizes(ImageShape::new(100, 50), &[8, 32]),
            vec![(13, 7), (4, 2)]
        );
    }

    #[test]
    fn zero_offset_places_priors_on_grid_corners() {
        let priors = grid_priors(&[(1, 2)], &[8], 0.0);
        assert_eq!(priors[1].center, Point2::new(8.0, 0.0));
    }
}
