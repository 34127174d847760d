//! Facade crate for the `yolox-pose-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometric core and the head's training core
//! - [`pipeline`]: end-to-end helpers that evaluate the loss of a recorded
//!   batch or decode recorded head output into NMS candidates
//! - (feature `cli`) the `yolox-pose` binary wrapping those helpers
//!
//! ## Quickstart
//!
//! ```no_run
//! use yolox_pose::head::{BatchRecord, HeadConfig};
//! use yolox_pose::pipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HeadConfig::load_json("head.json")?;
//! let record: BatchRecord = yolox_pose::head::load_json("batch.json")?;
//! let report = pipeline::evaluate_batch(&config, record, 0)?;
//! for (name, value) in report.losses.named() {
//!     println!("{name}: {value:.4}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `yolox_pose::core`: boxes, homographies, keypoint arrays, keypoint
//!   transforms, the COCO keypoint schema.
//! - `yolox_pose::head`: priors, box and keypoint coders, SimOTA, losses,
//!   collation, filtering, candidate decoding.

pub use yolox_pose_core as core;
pub use yolox_pose_head as head;

pub use yolox_pose_core::{BBox, Instance, InstanceSet, KeypointSchema, Visibility};
pub use yolox_pose_head::{HeadConfig, LossComponents, PoseHeadLoss, TrainingPhase};

pub mod pipeline;
