//! Core types and utilities for YOLOX-Pose training.
//!
//! This crate is intentionally small and purely geometric: boxes, planar
//! transforms, keypoint arrays with COCO visibility, the keypoint transforms
//! used by augmentation and loss code, and the dataset keypoint schema. It
//! does not know about network outputs or label assignment.

mod bbox;
mod homography;
mod image;
mod instance;
mod keypoints;
mod logger;
mod schema;
pub mod transforms;

pub use bbox::{bbox_overlaps, BBox};
pub use homography::Homography;
pub use image::{ImageShape, ImageTensor};
pub use instance::{Instance, InstanceSet};
pub use keypoints::{
    KeypointArray, KeypointError, KeypointOffsets, KeypointVisibility, Keypoints, Visibility,
};
pub use schema::{KeypointSchema, SchemaError, COCO_SIGMAS};
pub use transforms::{FlipDirection, InsideMode};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
