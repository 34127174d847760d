//! Test-time decoding of raw head output into NMS candidates.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use yolox_pose_core::BBox;

use crate::prediction::sigmoid;
use crate::{HeadError, ImagePredictions, PriorPoint, TestConfig, YoloxBBoxCoder, YoloxKeypointCoder};

/// One detection before non-maximum suppression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub score: f32,
    pub label: usize,
    pub bbox: BBox,
    pub keypoints: Vec<Point2<f32>>,
    /// Prior the candidate was decoded from.
    pub prior_index: usize,
}

/// Score, threshold and sort the predictions of one image.
///
/// `score = sigmoid(cls) * sigmoid(obj)`. With `multi_label` a prior yields
/// one candidate per class above `score_thr`, otherwise only its best class
/// is considered. At most `max_per_img` candidates are returned, best first.
pub fn decode_candidates(
    preds: &ImagePredictions,
    priors: &[PriorPoint],
    cfg: &TestConfig,
) -> Result<Vec<Candidate>, HeadError> {
    if preds.len() != priors.len() {
        return Err(HeadError::PriorCountMismatch {
            predictions: preds.len(),
            priors: priors.len(),
        });
    }
    let mut hits: Vec<(f32, usize, usize)> = Vec::new();
    for (p, anchor) in preds.anchors.iter().enumerate() {
        let obj = sigmoid(anchor.obj_logit);
        let scores = anchor.cls_logits.iter().map(|&c| sigmoid(c) * obj);
        if cfg.multi_label {
            hits.extend(
                scores
                    .enumerate()
                    .filter(|&(_, s)| s > cfg.score_thr)
                    .map(|(c, s)| (s, c, p)),
            );
        } else if let Some((c, s)) = scores.enumerate().max_by(|a, b| a.1.total_cmp(&b.1)) {
            if s > cfg.score_thr {
                hits.push((s, c, p));
            }
        }
    }
    hits.sort_by(|a, b| b.0.total_cmp(&a.0));
    hits.truncate(cfg.max_per_img);

    let (bbox_coder, kpt_coder) = (YoloxBBoxCoder, YoloxKeypointCoder);
    Ok(hits
        .into_iter()
        .map(|(score, label, p)| {
            let anchor = &preds.anchors[p];
            Candidate {
                score,
                label,
                bbox: bbox_coder.decode(&anchor.bbox_reg, &priors[p]),
                keypoints: kpt_coder.decode(&anchor.kpt_offsets, &priors[p]),
                prior_index: p,
            }
        })
        .collect())
}
