//! Geometric keypoint transforms shared by the augmentation pipeline and the
//! training losses.
//!
//! Every function consumes its coordinate array and returns the transformed
//! one, so a buffer shared between pipeline stages is handed over explicitly
//! at each call. Zero-instance inputs are returned unchanged.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{Homography, ImageShape, KeypointError, KeypointVisibility, Keypoints, Visibility};

/// Combination rule for the four image-bound conditions of [`is_inside`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsideMode {
    /// All four bounds must hold (the point lies inside the image).
    All,
    /// Any single bound is enough.
    Any,
}

/// Mirror axis for [`flip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    Horizontal,
    Vertical,
    Diagonal,
}

/// Multiply x and y by per-axis scale factors.
pub fn rescale(mut kpt: Keypoints, scale: (f32, f32)) -> Keypoints {
    for p in kpt.as_mut_slice() {
        p.x *= scale.0;
        p.y *= scale.1;
    }
    kpt
}

/// Add per-axis offsets.
pub fn translate(mut kpt: Keypoints, offset: (f32, f32)) -> Keypoints {
    for p in kpt.as_mut_slice() {
        p.x += offset.0;
        p.y += offset.1;
    }
    kpt
}

/// Mark keypoints outside `[0, width) x [0, height)` as absent.
///
/// Coordinates are left untouched.
pub fn clip(
    kpt: &Keypoints,
    mut vis: KeypointVisibility,
    shape: ImageShape,
) -> Result<KeypointVisibility, KeypointError> {
    kpt.ensure_same_layout(&vis)?;
    let inside = is_inside(kpt, shape, InsideMode::All, 0.0);
    for (v, ok) in vis.as_mut_slice().iter_mut().zip(inside.as_slice()) {
        if !ok {
            *v = Visibility::Absent;
        }
    }
    Ok(vis)
}

/// Per-keypoint bound test against the image shrunk by `allowed_border`.
///
/// The four conditions are `x >= b`, `x < w - b`, `y >= b`, `y < h - b`.
/// [`InsideMode::All`] requires every one of them, [`InsideMode::Any`] only
/// one; filters built on top of this rely on both behaviours.
pub fn is_inside(
    kpt: &Keypoints,
    shape: ImageShape,
    mode: InsideMode,
    allowed_border: f32,
) -> crate::KeypointArray<bool> {
    let w = shape.width as f32;
    let h = shape.height as f32;
    let b = allowed_border;
    kpt.clone().map(|p| {
        let conds = [p.x >= b, p.x < w - b, p.y >= b, p.y < h - b];
        match mode {
            InsideMode::All => conds.iter().all(|&c| c),
            InsideMode::Any => conds.iter().any(|&c| c),
        }
    })
}

/// Apply the affine part of `h` to every keypoint.
pub fn project(mut kpt: Keypoints, h: &Homography) -> Keypoints {
    for p in kpt.as_mut_slice() {
        *p = h.apply_affine(*p);
    }
    kpt
}

/// Mirror keypoints and swap left/right joints.
///
/// `flip_indices[k]` names the keypoint that lands in slot `k` after the
/// flip; visibility is permuted the same way. Horizontal mirroring maps
/// `x -> width - 1 - x` (vertical likewise with the height), so applying
/// the same flip twice restores the input.
pub fn flip(
    kpt: Keypoints,
    vis: KeypointVisibility,
    shape: ImageShape,
    direction: FlipDirection,
    flip_indices: &[usize],
) -> Result<(Keypoints, KeypointVisibility), KeypointError> {
    kpt.ensure_same_layout(&vis)?;
    let mut kpt = kpt.permute_keypoints(flip_indices)?;
    let vis = vis.permute_keypoints(flip_indices)?;

    let w = shape.width as f32;
    let h = shape.height as f32;
    for p in kpt.as_mut_slice() {
        match direction {
            FlipDirection::Horizontal => p.x = w - 1.0 - p.x,
            FlipDirection::Vertical => p.y = h - 1.0 - p.y,
            FlipDirection::Diagonal => {
                p.x = w - 1.0 - p.x;
                p.y = h - 1.0 - p.y;
            }
        }
    }
    Ok((kpt, vis))
}

/// Area of the axis-aligned rectangle enclosing all keypoints of each instance.
pub fn area(kpt: &Keypoints) -> Vec<f32> {
    kpt.instances().map(|row| extent_area(row.iter())).collect()
}

/// Like [`area`], restricted to labelled keypoints.
///
/// Unlabelled COCO keypoints sit at `(0, 0)`; excluding them keeps the
/// scale of partially annotated people meaningful. Instances with no
/// labelled keypoint get `0`.
pub fn visible_area(kpt: &Keypoints, vis: &KeypointVisibility) -> Result<Vec<f32>, KeypointError> {
    kpt.ensure_same_layout(vis)?;
    Ok(kpt
        .instances()
        .zip(vis.instances())
        .map(|(row, flags)| {
            extent_area(
                row.iter()
                    .zip(flags)
                    .filter(|(_, v)| v.is_labeled())
                    .map(|(p, _)| p),
            )
        })
        .collect())
}

fn extent_area<'a>(points: impl Iterator<Item = &'a Point2<f32>>) -> f32 {
    let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    let mut any = false;
    for p in points {
        any = true;
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if !any {
        return 0.0;
    }
    (max.x - min.x) * (max.y - min.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeypointArray;
    use approx::assert_abs_diff_eq;

    fn kpts(rows: &[&[(f32, f32)]]) -> Keypoints {
        let rows: Vec<Vec<Point2<f32>>> = rows
            .iter()
            .map(|r| r.iter().map(|&(x, y)| Point2::new(x, y)).collect())
            .collect();
        Keypoints::try_from(rows).expect("rectangular rows")
    }

    fn all_visible(kpt: &Keypoints) -> KeypointVisibility {
        kpt.clone().map(|_| Visibility::Visible)
    }

    #[test]
    fn rescale_and_translate() {
        let k = kpts(&[&[(1.0, 2.0), (3.0, 4.0)]]);
        let k = rescale(k, (2.0, 0.5));
        assert_eq!(k.as_slice()[1], Point2::new(6.0, 2.0));
        let k = translate(k, (-1.0, 10.0));
        assert_eq!(k.as_slice()[0], Point2::new(1.0, 11.0));
    }

    #[test]
    fn clip_only_touches_visibility() {
        let k = kpts(&[&[(5.0, 5.0), (-1.0, 5.0), (5.0, 20.0), (9.999, 0.0)]]);
        let shape = ImageShape::new(10, 10);
        let vis = clip(&k, all_visible(&k), shape).unwrap();
        assert_eq!(
            vis.as_slice(),
            &[
                Visibility::Visible,
                Visibility::Absent,
                Visibility::Absent,
                Visibility::Visible
            ]
        );
        assert_eq!(k.as_slice()[1], Point2::new(-1.0, 5.0));
    }

    #[test]
    fn inside_modes_differ() {
        let k = kpts(&[&[(-5.0, 5.0), (50.0, 50.0)]]);
        let shape = ImageShape::new(10, 10);
        let all = is_inside(&k, shape, InsideMode::All, 0.0);
        let any = is_inside(&k, shape, InsideMode::Any, 0.0);
        assert_eq!(all.as_slice(), &[false, false]);
        // (-5, 5) satisfies x < w, y >= 0, y < h; (50, 50) satisfies x >= 0.
        assert_eq!(any.as_slice(), &[true, true]);
    }

    #[test]
    fn allowed_border_shrinks_the_image() {
        let k = kpts(&[&[(1.0, 5.0)]]);
        let shape = ImageShape::new(10, 10);
        assert!(is_inside(&k, shape, InsideMode::All, 0.0).as_slice()[0]);
        assert!(!is_inside(&k, shape, InsideMode::All, 2.0).as_slice()[0]);
    }

    #[test]
    fn project_uses_affine_rows() {
        let k = kpts(&[&[(1.0, 1.0)]]);
        let h = Homography::from_array([[2.0, 0.0, 3.0], [0.0, 1.0, -1.0], [0.0, 0.0, 1.0]]);
        let out = project(k, &h);
        assert_eq!(out.as_slice()[0], Point2::new(5.0, 0.0));
    }

    #[test]
    fn flip_swaps_and_mirrors() {
        let k = kpts(&[&[(1.0, 2.0), (7.0, 3.0)]]);
        let vis = KeypointArray::new(2, vec![Visibility::Visible, Visibility::Occluded]).unwrap();
        let shape = ImageShape::new(6, 10);
        let (out, out_vis) = flip(k, vis, shape, FlipDirection::Horizontal, &[1, 0]).unwrap();
        assert_eq!(out.as_slice()[0], Point2::new(2.0, 3.0));
        assert_eq!(out.as_slice()[1], Point2::new(8.0, 2.0));
        assert_eq!(out_vis.as_slice(), &[Visibility::Occluded, Visibility::Visible]);
    }

    #[test]
    fn flip_is_an_involution() {
        let schema = crate::KeypointSchema::coco();
        let rows: Vec<Vec<Point2<f32>>> = (0..3)
            .map(|i| {
                (0..17)
                    .map(|k| Point2::new(3.0 * k as f32 + i as f32, 7.0 * i as f32 + 0.5 * k as f32))
                    .collect()
            })
            .collect();
        let k = Keypoints::try_from(rows).unwrap();
        let vis = k
            .clone()
            .map(|p| if p.x > 20.0 { Visibility::Visible } else { Visibility::Occluded });
        let shape = ImageShape::new(480, 640);
        for dir in [
            FlipDirection::Horizontal,
            FlipDirection::Vertical,
            FlipDirection::Diagonal,
        ] {
            let (k1, v1) = flip(k.clone(), vis.clone(), shape, dir, &schema.flip_indices).unwrap();
            let (k2, v2) = flip(k1, v1, shape, dir, &schema.flip_indices).unwrap();
            assert_eq!(v2, vis);
            for (a, b) in k2.as_slice().iter().zip(k.as_slice()) {
                assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-4);
                assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn flip_rejects_mismatched_permutation() {
        let k = kpts(&[&[(1.0, 2.0), (7.0, 3.0)]]);
        let vis = all_visible(&k);
        let shape = ImageShape::new(6, 10);
        assert!(flip(k, vis, shape, FlipDirection::Horizontal, &[0, 1, 2]).is_err());
    }

    #[test]
    fn area_of_enclosing_rectangle() {
        let k = kpts(&[&[(0.0, 0.0), (4.0, 1.0), (2.0, 3.0)], &[(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)]]);
        assert_eq!(area(&k), vec![12.0, 0.0]);
    }

    #[test]
    fn visible_area_ignores_unlabelled_points() {
        let k = kpts(&[&[(0.0, 0.0), (10.0, 10.0), (14.0, 12.0)]]);
        let vis = KeypointArray::new(
            3,
            vec![Visibility::Absent, Visibility::Visible, Visibility::Occluded],
        )
        .unwrap();
        assert_eq!(visible_area(&k, &vis).unwrap(), vec![8.0]);
    }

    #[test]
    fn zero_instances_are_tolerated() {
        let k = Keypoints::empty(17);
        let vis = KeypointVisibility::empty(17);
        let shape = ImageShape::new(10, 10);
        assert!(rescale(k.clone(), (2.0, 2.0)).is_empty());
        assert!(translate(k.clone(), (2.0, 2.0)).is_empty());
        assert!(clip(&k, vis.clone(), shape).unwrap().is_empty());
        assert!(is_inside(&k, shape, InsideMode::Any, 0.0).is_empty());
        assert!(project(k.clone(), &Homography::identity()).is_empty());
        let (fk, fv) = flip(k.clone(), vis.clone(), shape, FlipDirection::Vertical, &[0; 17]).unwrap();
        assert!(fk.is_empty() && fv.is_empty());
        assert!(area(&k).is_empty());
        assert!(visible_area(&k, &vis).unwrap().is_empty());
    }
}
