//! Keypoint regression targets relative to a prior.
//!
//! The head regresses every keypoint as an offset from its prior center in
//! stride units: `xy = center + offset * stride`. Visibility is not
//! regressed; it travels with the ground truth and only weights the OKS loss.

use nalgebra::{Point2, Vector2};
use yolox_pose_core::{KeypointOffsets, Keypoints};

use crate::{HeadError, PriorPoint};

#[derive(Clone, Copy, Debug, Default)]
pub struct YoloxKeypointCoder;

impl YoloxKeypointCoder {
    /// Offsets that decode back to `gt` at `prior`.
    pub fn encode(&self, gt: &[Point2<f32>], prior: &PriorPoint) -> Vec<Vector2<f32>> {
        gt.iter().map(|p| (p - prior.center) / prior.stride).collect()
    }

    /// Image-space keypoints of one prediction.
    pub fn decode(&self, offsets: &[Vector2<f32>], prior: &PriorPoint) -> Vec<Point2<f32>> {
        offsets
            .iter()
            .map(|o| prior.center + o * prior.stride)
            .collect()
    }

    /// Decode one row of offsets per prior.
    pub fn decode_all(
        &self,
        offsets: &KeypointOffsets,
        priors: &[PriorPoint],
    ) -> Result<Keypoints, HeadError> {
        if offsets.num_instances() != priors.len() {
            return Err(HeadError::PriorCountMismatch {
                predictions: offsets.num_instances(),
                priors: priors.len(),
            });
        }
        let mut data = Vec::with_capacity(offsets.as_slice().len());
        for (row, prior) in offsets.instances().zip(priors) {
            data.extend(self.decode(row, prior));
        }
        Ok(Keypoints::new(offsets.num_keypoints(), data)?)
    }

    /// Encode ground-truth instances against the priors they were matched to.
    pub fn encode_all(
        &self,
        gt: &Keypoints,
        priors: &[PriorPoint],
    ) -> Result<KeypointOffsets, HeadError> {
        if gt.num_instances() != priors.len() {
            return Err(HeadError::PriorCountMismatch {
                predictions: gt.num_instances(),
                priors: priors.len(),
            });
        }
        let mut data = Vec::with_capacity(gt.as_slice().len());
        for (row, prior) in gt.instances().zip(priors) {
            data.extend(self.encode(row, prior));
        }
        Ok(KeypointOffsets::new(gt.num_keypoints(), data)?)
    }
}
