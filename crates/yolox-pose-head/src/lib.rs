//! Training core of the YOLOX-Pose detection + keypoint head.
//!
//! Per image the pipeline is:
//!
//! 1. lay priors (anchor points) over the feature pyramid ([`priors_for_image`]),
//! 2. decode raw box regression and score every prior ([`ImagePredictions`]),
//! 3. match priors to ground truth with SimOTA ([`SimOtaAssigner`]),
//! 4. accumulate the classification, objectness, box and OKS keypoint
//!    losses ([`PoseHeadLoss`]).
//!
//! Images are independent until the final normalisation, which divides every
//! term by the number of positives in the whole batch. [`collate`] builds
//! batches from per-image samples, [`decode_candidates`] turns raw output into
//! NMS input at test time.
//!
//! ## Quickstart
//!
//! ```
//! use yolox_pose_core::{ImageShape, InstanceSet};
//! use yolox_pose_head::{HeadConfig, ImageLossInput, ImagePredictions, PoseHeadLoss, TrainingPhase};
//!
//! let head = PoseHeadLoss::new(HeadConfig::default()).unwrap();
//! let priors = head.priors(ImageShape::new(64, 64));
//! let preds = ImagePredictions::default();
//! let gt = InstanceSet::empty(17);
//! // no predictions for the priors is a wiring error
//! let input = ImageLossInput { priors: &priors, predictions: &preds, gt: &gt };
//! assert!(head.loss(&[input], TrainingPhase::Stage1).is_err());
//! ```

mod assigner;
mod batch_shape;
mod bbox_coder;
mod collate;
mod config;
mod error;
mod filter;
mod head;
mod io;
mod kpt_coder;
pub mod loss;
mod phase;
mod postprocess;
mod prediction;
mod prior;

pub use assigner::{AssignInput, AssignResult, SimOtaAssigner, SimOtaParams};
pub use batch_shape::{BatchShapePolicy, BatchShapes};
pub use bbox_coder::YoloxBBoxCoder;
pub use collate::{collate, Batch, BatchInputs, BatchMode, CollateError, ImageSample, InstanceRow};
pub use config::{AssignerConfig, ConfigError, HeadConfig, TestConfig};
pub use error::HeadError;
pub use filter::{filter_annotations, FilterParams};
pub use head::{ImageLossInput, PoseHeadLoss};
pub use io::{
    load_json, write_json, BatchRecord, CandidatesReport, ImageRecord, IoError, LossReport,
    PredictionRecord,
};
pub use kpt_coder::YoloxKeypointCoder;
pub use loss::{LossComponents, LossParams, LossWeights, OksMode};
pub use phase::{PhaseSchedule, TrainingPhase};
pub use postprocess::{decode_candidates, Candidate};
pub use prediction::{AnchorPrediction, ImagePredictions};
pub use prior::{featmap_sizes, grid_priors, priors_for_image, PriorPoint};
