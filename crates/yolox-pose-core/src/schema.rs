//! Dataset keypoint metainfo: names, flip pairs, OKS sigmas and skeleton.

use serde::{Deserialize, Serialize};

use crate::keypoints::check_permutation;

/// Schema validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema has no keypoints")]
    Empty,
    #[error("{field} has {got} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("flip_indices must be a self-inverse permutation")]
    InvalidFlipIndices,
    #[error("sigma for keypoint {index} must be finite and > 0 (got {value})")]
    InvalidSigma { index: usize, value: f32 },
    #[error("skeleton link ({0}, {1}) references a missing keypoint")]
    InvalidLink(usize, usize),
}

/// Keypoint layout of a pose dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeypointSchema {
    pub names: Vec<String>,
    /// `flip_indices[k]`: keypoint that takes slot `k` after a mirror flip.
    pub flip_indices: Vec<usize>,
    /// Per-keypoint OKS falloff constants.
    pub sigmas: Vec<f32>,
    #[serde(default)]
    pub skeleton_links: Vec<(usize, usize)>,
}

const COCO_NAMES: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

const COCO_FLIP_INDICES: [usize; 17] = [0, 2, 1, 4, 3, 6, 5, 8, 7, 10, 9, 12, 11, 14, 13, 16, 15];

/// COCO keypoint evaluation sigmas.
pub const COCO_SIGMAS: [f32; 17] = [
    0.026, 0.025, 0.025, 0.035, 0.035, 0.079, 0.079, 0.072, 0.072, 0.062, 0.062, 0.107, 0.107,
    0.087, 0.087, 0.089, 0.089,
];

const COCO_SKELETON: [(usize, usize); 19] = [
    (15, 13),
    (13, 11),
    (16, 14),
    (14, 12),
    (11, 12),
    (5, 11),
    (6, 12),
    (5, 6),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (1, 2),
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (3, 5),
    (4, 6),
];

impl Default for KeypointSchema {
    fn default() -> Self {
        Self::coco()
    }
}

impl KeypointSchema {
    /// The 17-keypoint COCO person layout.
    pub fn coco() -> Self {
        Self {
            names: COCO_NAMES.iter().map(|s| s.to_string()).collect(),
            flip_indices: COCO_FLIP_INDICES.to_vec(),
            sigmas: COCO_SIGMAS.to_vec(),
            skeleton_links: COCO_SKELETON.to_vec(),
        }
    }

    #[inline]
    pub fn num_keypoints(&self) -> usize {
        self.names.len()
    }

    /// Index of a keypoint by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let k = self.num_keypoints();
        if k == 0 {
            return Err(SchemaError::Empty);
        }
        for (field, got) in [
            ("flip_indices", self.flip_indices.len()),
            ("sigmas", self.sigmas.len()),
        ] {
            if got != k {
                return Err(SchemaError::LengthMismatch {
                    field,
                    expected: k,
                    got,
                });
            }
        }
        check_permutation(&self.flip_indices, k).map_err(|_| SchemaError::InvalidFlipIndices)?;
        if self
            .flip_indices
            .iter()
            .enumerate()
            .any(|(i, &j)| self.flip_indices[j] != i)
        {
            return Err(SchemaError::InvalidFlipIndices);
        }
        if let Some((index, &value)) = self
            .sigmas
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_finite() || **s <= 0.0)
        {
            return Err(SchemaError::InvalidSigma { index, value });
        }
        if let Some(&(a, b)) = self
            .skeleton_links
            .iter()
            .find(|(a, b)| *a >= k || *b >= k)
        {
            return Err(SchemaError::InvalidLink(a, b));
        }
        Ok(())
    }
}
