//! Evaluation of recorded batches and head outputs.

use log::info;
use yolox_pose_core::KeypointError;
use yolox_pose_head::{
    collate, decode_candidates, priors_for_image, BatchRecord, CandidatesReport, CollateError,
    ConfigError, HeadConfig, HeadError, LossReport, PoseHeadLoss, PredictionRecord,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("image {index}: {source}")]
    Sample {
        index: usize,
        #[source]
        source: KeypointError,
    },
    #[error(transparent)]
    Collate(#[from] CollateError),
    #[error(transparent)]
    Head(#[from] HeadError),
}

/// Collate a recorded batch and evaluate the loss at `epoch` (0-based).
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(images = record.images.len(), epoch = epoch))
)]
pub fn evaluate_batch(
    config: &HeadConfig,
    record: BatchRecord,
    epoch: usize,
) -> Result<LossReport, PipelineError> {
    let head = PoseHeadLoss::new(config.clone())?;
    let samples = record
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            image
                .to_sample(config.num_keypoints)
                .map_err(|source| PipelineError::Sample { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let batch = collate(samples, record.mode, config.num_keypoints)?;
    let phase = config.schedule.phase(epoch);
    let losses = head.loss_for_batch(&batch, &record.predictions, phase)?;
    info!(
        "epoch {epoch} ({phase:?}): total {:.4}, {} positives",
        losses.total, losses.num_pos
    );
    Ok(LossReport {
        epoch,
        phase,
        losses,
    })
}

/// Decode each recorded image into candidates for the downstream NMS.
pub fn decode_records(
    config: &HeadConfig,
    records: &[PredictionRecord],
) -> Result<CandidatesReport, PipelineError> {
    config.validate()?;
    let mut images = Vec::with_capacity(records.len());
    for rec in records {
        let priors = priors_for_image(rec.shape, &config.featmap_strides, config.prior_offset);
        rec.predictions
            .validate(&priors, config.num_classes, config.num_keypoints)?;
        images.push(decode_candidates(&rec.predictions, &priors, &config.test)?);
    }
    Ok(CandidatesReport { images })
}
