use log::{debug, warn};
use nalgebra::{DMatrix, Point2};
use yolox_pose_core::{bbox_overlaps, BBox, InstanceSet};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{AssignResult, SimOtaParams};
use crate::{HeadError, PriorPoint};

/// Predictions of one image as seen by the assigner.
#[derive(Clone, Copy, Debug)]
pub struct AssignInput<'a> {
    pub priors: &'a [PriorPoint],
    /// Decoded boxes, one per prior.
    pub boxes: &'a [BBox],
    /// Class probabilities times objectness, `num_priors x num_classes`.
    pub scores: &'a DMatrix<f32>,
}

/// Dynamic top-k (SimOTA) assigner.
#[derive(Clone, Debug, Default)]
pub struct SimOtaAssigner {
    params: SimOtaParams,
}

/// Candidate priors that passed the coarse geometric filter.
struct Candidates {
    /// Prior index of each candidate.
    priors: Vec<usize>,
    /// `candidates x gts`: prior center inside the box and the center region.
    strict: DMatrix<bool>,
}

impl SimOtaAssigner {
    pub fn new(params: SimOtaParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &SimOtaParams {
        &self.params
    }

    /// Assign the priors of one image to its ground-truth instances.
    ///
    /// Malformed instances (degenerate box, non-finite keypoints, label out
    /// of range) are skipped. An image without usable instances, or without
    /// any prior near one, comes back all background.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(priors = input.priors.len(), gts = gts.len()))
    )]
    pub fn assign(
        &self,
        input: &AssignInput<'_>,
        gts: &InstanceSet,
    ) -> Result<AssignResult, HeadError> {
        let num_priors = input.priors.len();
        for got in [input.boxes.len(), input.scores.nrows()] {
            if got != num_priors {
                return Err(HeadError::PriorCountMismatch {
                    predictions: got,
                    priors: num_priors,
                });
            }
        }

        let mut result = AssignResult::background(num_priors, gts.len());
        let num_classes = input.scores.ncols();
        let gt_ids: Vec<usize> = (0..gts.len())
            .filter(|&g| gts.is_well_formed(g, num_classes))
            .collect();
        if gt_ids.len() < gts.len() {
            warn!(
                "ignoring {} malformed instance(s) out of {}",
                gts.len() - gt_ids.len(),
                gts.len()
            );
        }
        if gt_ids.is_empty() || num_priors == 0 {
            return Ok(result);
        }
        let gt_boxes: Vec<BBox> = gt_ids.iter().map(|&g| gts.bboxes[g]).collect();

        let cand = self.coarse_filter(input.priors, &gt_boxes);
        if cand.priors.is_empty() {
            debug!("sim_ota: no prior near {} ground truth(s)", gt_ids.len());
            return Ok(result);
        }

        let cand_boxes: Vec<BBox> = cand.priors.iter().map(|&p| input.boxes[p]).collect();
        let ious = bbox_overlaps(&cand_boxes, &gt_boxes, self.params.iou_eps);
        let cost = self.cost_matrix(input, gts, &gt_ids, &cand, &ious);
        let matching = self.dynamic_k_matching(&cost, &ious);

        for (i, &prior) in cand.priors.iter().enumerate() {
            let best = (0..gt_ids.len())
                .filter(|&j| matching[(i, j)])
                .min_by(|&a, &b| cost[(i, a)].total_cmp(&cost[(i, b)]));
            if let Some(j) = best {
                result.assigned_gt[prior] = Some(gt_ids[j]);
                result.max_overlaps[prior] = ious[(i, j)];
            }
        }

        debug!(
            "sim_ota: {} priors, {} candidates, {} gts, {} positives",
            num_priors,
            cand.priors.len(),
            gt_ids.len(),
            result.num_pos()
        );
        Ok(result)
    }

    fn coarse_filter(&self, priors: &[PriorPoint], gt_boxes: &[BBox]) -> Candidates {
        let mut kept = Vec::new();
        let mut strict = Vec::new();
        for (p, prior) in priors.iter().enumerate() {
            let radius = self.params.center_radius * prior.stride;
            let mut any = false;
            let flags: Vec<bool> = gt_boxes
                .iter()
                .map(|b| {
                    let in_box = b.contains(prior.center);
                    let in_center = center_region(b.center(), radius).contains(prior.center);
                    any |= in_box || in_center;
                    in_box && in_center
                })
                .collect();
            if any {
                kept.push(p);
                strict.extend(flags);
            }
        }
        // rows were pushed candidate by candidate
        let strict = DMatrix::from_row_slice(kept.len(), gt_boxes.len(), &strict);
        Candidates {
            priors: kept,
            strict,
        }
    }

    fn cost_matrix(
        &self,
        input: &AssignInput<'_>,
        gts: &InstanceSet,
        gt_ids: &[usize],
        cand: &Candidates,
        ious: &DMatrix<f32>,
    ) -> DMatrix<f32> {
        let p = &self.params;
        let num_classes = input.scores.ncols();
        DMatrix::from_fn(cand.priors.len(), gt_ids.len(), |i, j| {
            let prior = cand.priors[i];
            let label = gts.labels[gt_ids[j]];
            let cls_cost: f32 = (0..num_classes)
                .map(|c| {
                    let prob = input.scores[(prior, c)].max(0.0).sqrt();
                    let target = if c == label { 1.0 } else { 0.0 };
                    bce_prob(prob, target)
                })
                .sum();
            let iou_cost = -(ious[(i, j)] + p.iou_eps).ln();
            let penalty = if cand.strict[(i, j)] {
                0.0
            } else {
                p.large_penalty
            };
            p.cls_weight * cls_cost + p.iou_weight * iou_cost + penalty
        })
    }

    /// `candidates x gts` selection mask before conflict resolution.
    fn dynamic_k_matching(&self, cost: &DMatrix<f32>, ious: &DMatrix<f32>) -> DMatrix<bool> {
        let (num_cand, num_gt) = cost.shape();
        let topk = self.params.candidate_topk.min(num_cand);
        let mut matching = DMatrix::from_element(num_cand, num_gt, false);
        for j in 0..num_gt {
            let mut col: Vec<f32> = ious.column(j).iter().copied().collect();
            col.sort_unstable_by(|a, b| b.total_cmp(a));
            let k = (col[..topk].iter().sum::<f32>() as usize).clamp(1, num_cand);

            let mut order: Vec<usize> = (0..num_cand).collect();
            order.sort_by(|&a, &b| cost[(a, j)].total_cmp(&cost[(b, j)]));
            for &i in &order[..k] {
                matching[(i, j)] = true;
            }
        }
        matching
    }
}

fn center_region(center: Point2<f32>, radius: f32) -> BBox {
    BBox::new(
        center.x - radius,
        center.y - radius,
        center.x + radius,
        center.y + radius,
    )
}

/// Binary cross-entropy on a probability, logs clamped at `-100`.
#[inline]
fn bce_prob(p: f32, target: f32) -> f32 {
    let log_p = p.ln().max(-100.0);
    let log_q = (1.0 - p).ln().max(-100.0);
    -(target * log_p + (1.0 - target) * log_q)
}
