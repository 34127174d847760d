use nalgebra::{DMatrix, Vector2};
use serde::{Deserialize, Serialize};
use yolox_pose_core::BBox;

use crate::{HeadError, PriorPoint, YoloxBBoxCoder};

/// Raw head output at one prior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorPrediction {
    pub cls_logits: Vec<f32>,
    pub obj_logit: f32,
    /// `[dx, dy, log_w, log_h]`, see [`YoloxBBoxCoder`].
    pub bbox_reg: [f32; 4],
    /// One offset per keypoint in stride units.
    pub kpt_offsets: Vec<Vector2<f32>>,
}

/// Head output for every prior of one image, in prior order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePredictions {
    pub anchors: Vec<AnchorPrediction>,
}

impl ImagePredictions {
    pub fn new(anchors: Vec<AnchorPrediction>) -> Self {
        Self { anchors }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Check the prediction layout against the priors and head shape.
    pub fn validate(
        &self,
        priors: &[PriorPoint],
        num_classes: usize,
        num_keypoints: usize,
    ) -> Result<(), HeadError> {
        if self.anchors.len() != priors.len() {
            return Err(HeadError::PriorCountMismatch {
                predictions: self.anchors.len(),
                priors: priors.len(),
            });
        }
        for (index, a) in self.anchors.iter().enumerate() {
            if a.cls_logits.len() != num_classes {
                return Err(HeadError::ClassCountMismatch {
                    index,
                    expected: num_classes,
                    got: a.cls_logits.len(),
                });
            }
            if a.kpt_offsets.len() != num_keypoints {
                return Err(HeadError::KeypointCountMismatch {
                    head: num_keypoints,
                    dataset: a.kpt_offsets.len(),
                });
            }
        }
        Ok(())
    }

    /// Decoded boxes, one per prior.
    pub fn decode_boxes(&self, priors: &[PriorPoint]) -> Vec<BBox> {
        let coder = YoloxBBoxCoder;
        self.anchors
            .iter()
            .zip(priors)
            .map(|(a, p)| coder.decode(&a.bbox_reg, p))
            .collect()
    }

    /// `sigmoid(cls) * sigmoid(obj)`, `num_priors x num_classes`.
    pub fn scores(&self, num_classes: usize) -> DMatrix<f32> {
        DMatrix::from_fn(self.anchors.len(), num_classes, |i, c| {
            let a = &self.anchors[i];
            sigmoid(a.cls_logits[c]) * sigmoid(a.obj_logit)
        })
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn anchor(classes: usize, k: usize) -> AnchorPrediction {
        AnchorPrediction {
            cls_logits: vec![0.0; classes],
            obj_logit: 0.0,
            bbox_reg: [0.0; 4],
            kpt_offsets: vec![Vector2::zeros(); k],
        }
    }

    #[test]
    fn validate_reports_each_mismatch() {
        let priors = vec![PriorPoint::new(Point2::new(4.0, 4.0), 8.0); 2];
        let ok = ImagePredictions::new(vec![anchor(1, 17); 2]);
        ok.validate(&priors, 1, 17).unwrap();
        assert!(matches!(
            ok.validate(&priors[..1], 1, 17),
            Err(HeadError::PriorCountMismatch { .. })
        ));
        assert!(matches!(
            ok.validate(&priors, 2, 17),
            Err(HeadError::ClassCountMismatch { index: 0, .. })
        ));
        assert!(matches!(
            ok.validate(&priors, 1, 14),
            Err(HeadError::KeypointCountMismatch {
                head: 14,
                dataset: 17
            })
        ));
    }

    #[test]
    fn neutral_logits_score_a_quarter() {
        let preds = ImagePredictions::new(vec![anchor(2, 1)]);
        let s = preds.scores(2);
        assert_eq!(s.shape(), (1, 2));
        assert!((s[(0, 1)] - 0.25).abs() < 1e-6);
    }
}
