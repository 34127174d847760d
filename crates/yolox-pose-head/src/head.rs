//! Loss aggregation over a batch.

use log::debug;
use yolox_pose_core::{transforms, ImageShape, InstanceSet};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::loss::functional::{bce_with_logits, iou_loss_square, l1, oks, oks_loss};
use crate::{
    priors_for_image, AssignInput, Batch, ConfigError, HeadConfig, HeadError, ImagePredictions,
    LossComponents, PriorPoint, SimOtaAssigner, TrainingPhase, YoloxBBoxCoder,
    YoloxKeypointCoder,
};

/// Predictions and ground truth of one image.
#[derive(Clone, Copy, Debug)]
pub struct ImageLossInput<'a> {
    pub priors: &'a [PriorPoint],
    pub predictions: &'a ImagePredictions,
    pub gt: &'a InstanceSet,
}

/// Unweighted sums of one image, before normalisation.
#[derive(Clone, Copy, Debug, Default)]
struct LossSums {
    cls: f32,
    bbox: f32,
    obj: f32,
    bbox_aux: f32,
    kpt: f32,
    num_pos: usize,
}

impl std::ops::AddAssign for LossSums {
    fn add_assign(&mut self, rhs: Self) {
        self.cls += rhs.cls;
        self.bbox += rhs.bbox;
        self.obj += rhs.obj;
        self.bbox_aux += rhs.bbox_aux;
        self.kpt += rhs.kpt;
        self.num_pos += rhs.num_pos;
    }
}

/// Combined detection + keypoint loss of the YOLOX-Pose head.
#[derive(Clone, Debug)]
pub struct PoseHeadLoss {
    config: HeadConfig,
    assigner: SimOtaAssigner,
}

impl PoseHeadLoss {
    /// Validate `config` and build the assigner it selects.
    pub fn new(config: HeadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let assigner = config.assigner.build();
        Ok(Self { config, assigner })
    }

    #[inline]
    pub fn config(&self) -> &HeadConfig {
        &self.config
    }

    /// Priors of a network input of `shape`.
    pub fn priors(&self, shape: ImageShape) -> Vec<PriorPoint> {
        priors_for_image(shape, &self.config.featmap_strides, self.config.prior_offset)
    }

    /// Loss over a batch of images, normalised by the batch's positive count.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(images = images.len(), phase = ?phase))
    )]
    pub fn loss(
        &self,
        images: &[ImageLossInput<'_>],
        phase: TrainingPhase,
    ) -> Result<LossComponents, HeadError> {
        let mut sums = LossSums::default();
        for image in images {
            sums += self.image_sums(image, phase)?;
        }
        Ok(self.finish(sums, phase))
    }

    /// Loss of a collated batch; priors follow each image's input shape.
    pub fn loss_for_batch(
        &self,
        batch: &Batch,
        predictions: &[ImagePredictions],
        phase: TrainingPhase,
    ) -> Result<LossComponents, HeadError> {
        if predictions.len() != batch.num_images() {
            return Err(HeadError::ImageCountMismatch {
                predictions: predictions.len(),
                images: batch.num_images(),
            });
        }
        let mut sums = LossSums::default();
        for (index, preds) in predictions.iter().enumerate() {
            let Some(shape) = batch.inputs.image_shape(index) else {
                continue;
            };
            let priors = self.priors(shape);
            let gt = batch.image_instances(index);
            let input = ImageLossInput {
                priors: &priors,
                predictions: preds,
                gt: &gt,
            };
            sums += self.image_sums(&input, phase)?;
        }
        Ok(self.finish(sums, phase))
    }

    fn image_sums(
        &self,
        input: &ImageLossInput<'_>,
        phase: TrainingPhase,
    ) -> Result<LossSums, HeadError> {
        let cfg = &self.config;
        let k = cfg.num_keypoints;
        if !input.gt.is_empty() && input.gt.keypoints.num_keypoints() != k {
            return Err(HeadError::KeypointCountMismatch {
                head: k,
                dataset: input.gt.keypoints.num_keypoints(),
            });
        }
        input.gt.check_layout()?;
        let preds = input.predictions;
        preds.validate(input.priors, cfg.num_classes, k)?;

        let boxes = preds.decode_boxes(input.priors);
        let scores = preds.scores(cfg.num_classes);
        let assign = self.assigner.assign(
            &AssignInput {
                priors: input.priors,
                boxes: &boxes,
                scores: &scores,
            },
            input.gt,
        )?;

        let mut sums = LossSums {
            num_pos: assign.num_pos(),
            ..LossSums::default()
        };
        for (p, anchor) in preds.anchors.iter().enumerate() {
            let target = if assign.is_positive(p) { 1.0 } else { 0.0 };
            sums.obj += bce_with_logits(anchor.obj_logit, target);
        }
        if sums.num_pos == 0 {
            return Ok(sums);
        }

        let lp = &cfg.loss;
        let areas = transforms::visible_area(&input.gt.keypoints, &input.gt.visibility)?;
        let kpt_coder = YoloxKeypointCoder;
        for (p, g) in assign.pairs() {
            let anchor = &preds.anchors[p];
            let prior = &input.priors[p];
            let gt_box = &input.gt.bboxes[g];
            let label = input.gt.labels[g];

            sums.cls += anchor
                .cls_logits
                .iter()
                .enumerate()
                .map(|(c, &x)| bce_with_logits(x, if c == label { 1.0 } else { 0.0 }))
                .sum::<f32>();
            sums.bbox += iou_loss_square(&boxes[p], gt_box, lp.iou_eps);
            if phase.uses_bbox_aux() {
                let target = YoloxBBoxCoder.encode(gt_box, prior, lp.bbox_aux_eps);
                sums.bbox_aux += l1(&anchor.bbox_reg, &target);
            }

            let (Some(gt_kpt), Some(gt_vis)) =
                (input.gt.keypoints.instance(g), input.gt.visibility.instance(g))
            else {
                continue;
            };
            let area = match areas.get(g) {
                Some(&a) if a > 0.0 => a,
                _ => gt_box.area(),
            };
            let decoded = kpt_coder.decode(&anchor.kpt_offsets, prior);
            if let Some(sim) = oks(&decoded, gt_kpt, gt_vis, &cfg.schema.sigmas, area, lp.oks_eps) {
                sums.kpt += oks_loss(sim, lp.oks_mode, lp.oks_eps);
            }
        }
        debug!(
            "image loss: {} gts, {} positives",
            input.gt.len(),
            sums.num_pos
        );
        Ok(sums)
    }

    fn finish(&self, sums: LossSums, phase: TrainingPhase) -> LossComponents {
        let w = &self.config.loss.weights;
        let norm = sums.num_pos.max(1) as f32;
        let loss_cls = w.loss_cls * sums.cls / norm;
        let loss_bbox = w.loss_bbox * sums.bbox / norm;
        let loss_obj = w.loss_obj * sums.obj / norm;
        let loss_kpt = w.loss_kpt * sums.kpt / norm;
        let loss_bbox_aux = phase
            .uses_bbox_aux()
            .then(|| w.loss_bbox_aux * sums.bbox_aux / norm);
        LossComponents {
            total: loss_cls + loss_bbox + loss_obj + loss_kpt + loss_bbox_aux.unwrap_or(0.0),
            loss_cls,
            loss_bbox,
            loss_obj,
            loss_bbox_aux,
            loss_kpt,
            num_pos: sums.num_pos,
        }
    }
}
