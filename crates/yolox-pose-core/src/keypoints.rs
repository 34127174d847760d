//! Per-instance keypoint arrays.
//!
//! Coordinates and visibility are stored in two parallel arrays of shape
//! `N x K` (instances x keypoints). Visibility is never interleaved with the
//! coordinates, so every geometric routine works on the two coordinate
//! channels only.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Errors raised when keypoint arrays disagree on their layout.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeypointError {
    #[error("keypoint count mismatch (expected {expected}, got {got})")]
    CountMismatch { expected: usize, got: usize },
    #[error("instance count mismatch (expected {expected}, got {got})")]
    InstanceMismatch { expected: usize, got: usize },
    #[error("array of {len} values is not a multiple of {num_keypoints} keypoints")]
    RaggedArray { len: usize, num_keypoints: usize },
    #[error("invalid visibility code {0} (expected 0, 1 or 2)")]
    InvalidVisibility(u8),
    #[error("flip indices are not a permutation of 0..{0}")]
    InvalidFlipIndices(usize),
}

/// COCO visibility flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Visibility {
    /// Not labelled.
    #[default]
    Absent,
    /// Labelled but not visible.
    Occluded,
    Visible,
}

impl Visibility {
    /// Labelled keypoints (occluded or visible) take part in the OKS loss.
    #[inline]
    pub fn is_labeled(self) -> bool {
        !matches!(self, Visibility::Absent)
    }
}

impl TryFrom<u8> for Visibility {
    type Error = KeypointError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Visibility::Absent),
            1 => Ok(Visibility::Occluded),
            2 => Ok(Visibility::Visible),
            other => Err(KeypointError::InvalidVisibility(other)),
        }
    }
}

impl From<Visibility> for u8 {
    fn from(v: Visibility) -> Self {
        match v {
            Visibility::Absent => 0,
            Visibility::Occluded => 1,
            Visibility::Visible => 2,
        }
    }
}

/// Dense `N x K` array stored row-major (one row per instance).
///
/// Serialises as a list of rows. An empty array carries its `K` only in
/// memory; deserialising `[]` yields `K = 0`, which every layout check
/// accepts as "no instances".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<T>>", into = "Vec<Vec<T>>")]
#[serde(bound(
    serialize = "T: Clone + Serialize",
    deserialize = "T: Clone + Deserialize<'de>"
))]
pub struct KeypointArray<T> {
    num_keypoints: usize,
    data: Vec<T>,
}

/// Keypoint coordinates in image pixels.
pub type Keypoints = KeypointArray<Point2<f32>>;
/// Visibility flags parallel to [`Keypoints`].
pub type KeypointVisibility = KeypointArray<Visibility>;
/// Per-keypoint regression offsets in stride units.
pub type KeypointOffsets = KeypointArray<Vector2<f32>>;

impl<T> KeypointArray<T> {
    /// Wrap a flat row-major buffer.
    pub fn new(num_keypoints: usize, data: Vec<T>) -> Result<Self, KeypointError> {
        let ragged = if num_keypoints == 0 {
            !data.is_empty()
        } else {
            data.len() % num_keypoints != 0
        };
        if ragged {
            return Err(KeypointError::RaggedArray {
                len: data.len(),
                num_keypoints,
            });
        }
        Ok(Self {
            num_keypoints,
            data,
        })
    }

    /// Zero instances with a known keypoint count.
    pub fn empty(num_keypoints: usize) -> Self {
        Self {
            num_keypoints,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn num_keypoints(&self) -> usize {
        self.num_keypoints
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        if self.num_keypoints == 0 {
            0
        } else {
            self.data.len() / self.num_keypoints
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Keypoints of one instance.
    pub fn instance(&self, index: usize) -> Option<&[T]> {
        if index >= self.num_instances() {
            return None;
        }
        let k = self.num_keypoints;
        self.data.get(index * k..(index + 1) * k)
    }

    /// Iterate over instances as `K`-long slices.
    pub fn instances(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.num_keypoints.max(1))
    }

    pub fn instances_mut(&mut self) -> std::slice::ChunksExactMut<'_, T> {
        self.data.chunks_exact_mut(self.num_keypoints.max(1))
    }

    /// Append one instance; its length must equal `K`.
    ///
    /// An array created with `K = 0` adopts the row length of its first
    /// instance.
    pub fn push_instance(&mut self, row: &[T]) -> Result<(), KeypointError>
    where
        T: Clone,
    {
        if self.num_keypoints == 0 && self.data.is_empty() {
            self.num_keypoints = row.len();
        }
        if row.len() != self.num_keypoints {
            return Err(KeypointError::CountMismatch {
                expected: self.num_keypoints,
                got: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Element-wise conversion keeping the layout.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> KeypointArray<U> {
        KeypointArray {
            num_keypoints: self.num_keypoints,
            data: self.data.into_iter().map(f).collect(),
        }
    }

    /// Select a subset of instances, in the given order.
    pub fn select_instances(&self, indices: &[usize]) -> Self
    where
        T: Clone,
    {
        let mut data = Vec::with_capacity(indices.len() * self.num_keypoints);
        for &i in indices {
            if let Some(row) = self.instance(i) {
                data.extend_from_slice(row);
            }
        }
        Self {
            num_keypoints: self.num_keypoints,
            data,
        }
    }

    /// Reorder keypoints inside every instance: `out[k] = in[order[k]]`.
    pub fn permute_keypoints(self, order: &[usize]) -> Result<Self, KeypointError>
    where
        T: Clone,
    {
        if self.is_empty() {
            return Ok(self);
        }
        check_permutation(order, self.num_keypoints)?;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.instances() {
            data.extend(order.iter().map(|&k| row[k].clone()));
        }
        Ok(Self {
            num_keypoints: self.num_keypoints,
            data,
        })
    }

    /// Check that `other` describes the same `N x K` layout.
    ///
    /// Empty arrays are compatible with anything of zero instances.
    pub fn ensure_same_layout<U>(&self, other: &KeypointArray<U>) -> Result<(), KeypointError> {
        if self.num_instances() != other.num_instances() {
            return Err(KeypointError::InstanceMismatch {
                expected: self.num_instances(),
                got: other.num_instances(),
            });
        }
        if !self.is_empty() && self.num_keypoints != other.num_keypoints {
            return Err(KeypointError::CountMismatch {
                expected: self.num_keypoints,
                got: other.num_keypoints,
            });
        }
        Ok(())
    }
}

impl Keypoints {
    /// All coordinates of an instance are finite.
    pub fn instance_is_finite(&self, index: usize) -> bool {
        self.instance(index)
            .is_some_and(|row| row.iter().all(|p| p.x.is_finite() && p.y.is_finite()))
    }
}

impl KeypointVisibility {
    /// Number of labelled keypoints per instance.
    pub fn labeled_counts(&self) -> Vec<usize> {
        self.instances()
            .map(|row| row.iter().filter(|v| v.is_labeled()).count())
            .collect()
    }
}

impl<T: Clone> TryFrom<Vec<Vec<T>>> for KeypointArray<T> {
    type Error = KeypointError;

    fn try_from(rows: Vec<Vec<T>>) -> Result<Self, Self::Error> {
        let mut out = Self::empty(rows.first().map_or(0, Vec::len));
        for row in &rows {
            out.push_instance(row)?;
        }
        Ok(out)
    }
}

impl<T: Clone> From<KeypointArray<T>> for Vec<Vec<T>> {
    fn from(arr: KeypointArray<T>) -> Self {
        arr.instances().map(<[T]>::to_vec).collect()
    }
}

pub(crate) fn check_permutation(order: &[usize], n: usize) -> Result<(), KeypointError> {
    if order.len() != n {
        return Err(KeypointError::InvalidFlipIndices(n));
    }
    let mut seen = vec![false; n];
    for &k in order {
        match seen.get_mut(k) {
            Some(slot) if !*slot => *slot = true,
            _ => return Err(KeypointError::InvalidFlipIndices(n)),
        }
    }
    Ok(())
}
