//! JSON config, dump and report helpers.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, path::Path};
use yolox_pose_core::{ImageShape, ImageTensor, Instance, InstanceSet, KeypointError};

use crate::{
    BatchMode, Candidate, HeadConfig, ImagePredictions, ImageSample, LossComponents,
    TrainingPhase,
};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, IoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write `value` as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

impl HeadConfig {
    /// Load a JSON config from disk; missing keys take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        load_json(path)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(self, path)
    }
}

fn default_channels() -> usize {
    3
}

/// Ground truth of one image as stored in a dump; pixels are not kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub shape: ImageShape,
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl ImageRecord {
    /// Sample with a zero-filled image of the recorded shape.
    pub fn to_sample(&self, num_keypoints: usize) -> Result<ImageSample, KeypointError> {
        Ok(ImageSample {
            image: ImageTensor::filled(self.shape.height, self.shape.width, self.channels, 0.0),
            gt: InstanceSet::from_instances(&self.instances, num_keypoints)?,
        })
    }
}

/// One training step: ground truth plus raw head output per image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    #[serde(default)]
    pub mode: BatchMode,
    pub images: Vec<ImageRecord>,
    pub predictions: Vec<ImagePredictions>,
}

/// Raw head output of one image for test-time decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub shape: ImageShape,
    pub predictions: ImagePredictions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossReport {
    pub epoch: usize,
    pub phase: TrainingPhase,
    pub losses: LossComponents,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidatesReport {
    /// One list per input image.
    pub images: Vec<Vec<Candidate>>,
}
