//! Head configuration and its startup validation.

use serde::{Deserialize, Serialize};
use yolox_pose_core::{KeypointSchema, SchemaError};

use crate::{LossParams, PhaseSchedule, SimOtaAssigner, SimOtaParams};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("schema describes {schema} keypoints, head is configured for {configured}")]
    SchemaMismatch { schema: usize, configured: usize },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Label assigner selection; the tag is the `"type"` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignerConfig {
    SimOta(SimOtaParams),
}

impl Default for AssignerConfig {
    fn default() -> Self {
        Self::SimOta(SimOtaParams::default())
    }
}

impl AssignerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::SimOta(p) => p.validate(),
        }
    }

    pub fn build(&self) -> SimOtaAssigner {
        match self {
            Self::SimOta(p) => SimOtaAssigner::new(p.clone()),
        }
    }
}

/// Inference-time candidate selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub score_thr: f32,
    pub max_per_img: usize,
    /// Emit one candidate per class above threshold instead of the best class only.
    pub multi_label: bool,
    /// Forwarded to the downstream NMS.
    pub nms_iou_threshold: f32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            score_thr: 0.001,
            max_per_img: 300,
            multi_label: true,
            nms_iou_threshold: 0.65,
        }
    }
}

impl TestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.score_thr) {
            return Err(ConfigError::invalid("test.score_thr", "must be in [0, 1]"));
        }
        if self.max_per_img == 0 {
            return Err(ConfigError::invalid("test.max_per_img", "must be >= 1"));
        }
        if !(self.nms_iou_threshold > 0.0 && self.nms_iou_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "test.nms_iou_threshold",
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Everything the loss and decoding code needs to know about the head.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    pub num_classes: usize,
    pub num_keypoints: usize,
    pub featmap_strides: Vec<u32>,
    /// Prior position inside its cell, `0.5` for cell centers.
    pub prior_offset: f32,
    pub assigner: AssignerConfig,
    pub loss: LossParams,
    pub test: TestConfig,
    pub schedule: PhaseSchedule,
    pub schema: KeypointSchema,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            num_classes: 1,
            num_keypoints: 17,
            featmap_strides: vec![8, 16, 32],
            prior_offset: 0.5,
            assigner: AssignerConfig::default(),
            loss: LossParams::default(),
            test: TestConfig::default(),
            schedule: PhaseSchedule::default(),
            schema: KeypointSchema::coco(),
        }
    }
}

impl HeadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_classes == 0 {
            return Err(ConfigError::invalid("num_classes", "must be >= 1"));
        }
        if self.num_keypoints == 0 {
            return Err(ConfigError::invalid("num_keypoints", "must be >= 1"));
        }
        if self.featmap_strides.is_empty() || self.featmap_strides.contains(&0) {
            return Err(ConfigError::invalid(
                "featmap_strides",
                "must be a non-empty list of positive strides",
            ));
        }
        if !(0.0..=1.0).contains(&self.prior_offset) {
            return Err(ConfigError::invalid("prior_offset", "must be in [0, 1]"));
        }
        self.schema.validate()?;
        if self.schema.num_keypoints() != self.num_keypoints {
            return Err(ConfigError::SchemaMismatch {
                schema: self.schema.num_keypoints(),
                configured: self.num_keypoints,
            });
        }
        self.assigner.validate()?;
        self.loss.validate()?;
        self.test.validate()?;
        self.schedule.validate()
    }
}
