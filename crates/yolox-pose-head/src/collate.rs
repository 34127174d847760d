//! Batch collation of per-image samples.
//!
//! Instances of every image are flattened into one table whose rows carry
//! the owning image index; keypoints travel alongside in parallel arrays
//! with the same row order.

use serde::{Deserialize, Serialize};
use yolox_pose_core::{
    BBox, ImageShape, ImageTensor, InstanceSet, KeypointError, KeypointVisibility, Keypoints,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum CollateError {
    #[error("cannot collate an empty batch")]
    EmptyBatch,
    #[error("image {index} has shape {got:?}, stacked batches need {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },
    #[error("image {index} buffer holds {got} values, expected {expected}")]
    ImageBuffer {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("sample {index}: {source}")]
    Keypoints {
        index: usize,
        #[source]
        source: KeypointError,
    },
}

/// One augmented image with its ground truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    pub image: ImageTensor,
    pub gt: InstanceSet,
}

/// How images are laid out in a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One `N x H x W x C` buffer; every image must share its shape.
    #[default]
    Stacked,
    /// Images kept apart, for multi-scale training.
    List,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BatchInputs {
    Stacked {
        shape: ImageShape,
        channels: usize,
        /// Images back to back, each row-major `H x W x C`.
        data: Vec<f32>,
    },
    List(Vec<ImageTensor>),
}

impl BatchInputs {
    pub fn len(&self) -> usize {
        match self {
            Self::Stacked {
                shape,
                channels,
                data,
            } => {
                let per_image = shape.height * shape.width * channels;
                if per_image == 0 {
                    0
                } else {
                    data.len() / per_image
                }
            }
            Self::List(images) => images.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input shape of image `index`.
    pub fn image_shape(&self, index: usize) -> Option<ImageShape> {
        match self {
            Self::Stacked { shape, .. } => (index < self.len()).then_some(*shape),
            Self::List(images) => images.get(index).map(ImageTensor::shape),
        }
    }
}

/// One row of the flattened instance table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceRow {
    pub image_index: usize,
    pub label: usize,
    pub bbox: BBox,
}

impl InstanceRow {
    /// `[image_index, label, x1, y1, x2, y2]`
    pub fn to_array(&self) -> [f32; 6] {
        let [x1, y1, x2, y2] = self.bbox.to_array();
        [self.image_index as f32, self.label as f32, x1, y1, x2, y2]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub inputs: BatchInputs,
    pub instances: Vec<InstanceRow>,
    /// Row `i` belongs to `instances[i]`.
    pub keypoints: Keypoints,
    pub visibility: KeypointVisibility,
}

impl Batch {
    #[inline]
    pub fn num_images(&self) -> usize {
        self.inputs.len()
    }

    /// Ground truth of image `index`, in table order.
    pub fn image_instances(&self, index: usize) -> InstanceSet {
        let rows: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, r)| r.image_index == index)
            .map(|(i, _)| i)
            .collect();
        InstanceSet {
            bboxes: rows.iter().map(|&i| self.instances[i].bbox).collect(),
            labels: rows.iter().map(|&i| self.instances[i].label).collect(),
            keypoints: self.keypoints.select_instances(&rows),
            visibility: self.visibility.select_instances(&rows),
        }
    }

    /// Flattened `[image_index, label, x1, y1, x2, y2]` rows.
    pub fn instance_table(&self) -> Vec<[f32; 6]> {
        self.instances.iter().map(InstanceRow::to_array).collect()
    }
}

/// Collate samples into a batch.
///
/// Every sample must carry `num_keypoints` keypoints per instance. In
/// [`BatchMode::Stacked`] all images must share the first image's shape.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(samples), fields(images = samples.len()))
)]
pub fn collate(
    samples: Vec<ImageSample>,
    mode: BatchMode,
    num_keypoints: usize,
) -> Result<Batch, CollateError> {
    let first = samples.first().ok_or(CollateError::EmptyBatch)?;
    let dims = |img: &ImageTensor| (img.height, img.width, img.channels);
    let expected = dims(&first.image);

    let mut instances = Vec::new();
    let mut keypoints = Keypoints::empty(num_keypoints);
    let mut visibility = KeypointVisibility::empty(num_keypoints);
    for (index, s) in samples.iter().enumerate() {
        if !s.image.is_consistent() {
            return Err(CollateError::ImageBuffer {
                index,
                expected: s.image.expected_len(),
                got: s.image.data.len(),
            });
        }
        if mode == BatchMode::Stacked && dims(&s.image) != expected {
            return Err(CollateError::ShapeMismatch {
                index,
                expected,
                got: dims(&s.image),
            });
        }
        let keypoint_err = |source| CollateError::Keypoints { index, source };
        s.gt.check_layout().map_err(keypoint_err)?;
        if s.gt.keypoints.num_keypoints() != num_keypoints && !s.gt.is_empty() {
            return Err(keypoint_err(KeypointError::CountMismatch {
                expected: num_keypoints,
                got: s.gt.keypoints.num_keypoints(),
            }));
        }
        for (row, (bbox, &label)) in s.gt.bboxes.iter().zip(&s.gt.labels).enumerate() {
            instances.push(InstanceRow {
                image_index: index,
                label,
                bbox: *bbox,
            });
            if let (Some(k), Some(v)) = (s.gt.keypoints.instance(row), s.gt.visibility.instance(row)) {
                keypoints.push_instance(k).map_err(keypoint_err)?;
                visibility.push_instance(v).map_err(keypoint_err)?;
            }
        }
    }

    let inputs = match mode {
        BatchMode::Stacked => {
            let (height, width, channels) = expected;
            let mut data = Vec::with_capacity(samples.len() * first.image.expected_len());
            for s in samples {
                data.extend(s.image.data);
            }
            BatchInputs::Stacked {
                shape: ImageShape::new(height, width),
                channels,
                data,
            }
        }
        BatchMode::List => BatchInputs::List(samples.into_iter().map(|s| s.image).collect()),
    };
    Ok(Batch {
        inputs,
        instances,
        keypoints,
        visibility,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use yolox_pose_core::{Instance, Visibility};

    fn sample(h: usize, w: usize, boxes: &[BBox]) -> ImageSample {
        let instances: Vec<Instance> = boxes
            .iter()
            .map(|b| Instance {
                bbox: *b,
                label: 0,
                keypoints: vec![b.center(), Point2::new(b.x1, b.y1)],
                visibility: vec![Visibility::Visible, Visibility::Occluded],
            })
            .collect();
        ImageSample {
            image: ImageTensor::filled(h, w, 3, 0.0),
            gt: InstanceSet::from_instances(&instances, 2).unwrap(),
        }
    }

    #[test]
    fn instance_table_tracks_owning_image() {
        let a = BBox::new(0.0, 0.0, 4.0, 4.0);
        let b = BBox::new(1.0, 1.0, 6.0, 6.0);
        let c = BBox::new(2.0, 2.0, 8.0, 8.0);
        let batch = collate(
            vec![sample(8, 8, &[a, b]), sample(8, 8, &[]), sample(8, 8, &[c])],
            BatchMode::Stacked,
            2,
        )
        .unwrap();
        assert_eq!(batch.num_images(), 3);
        let table = batch.instance_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], [0.0, 0.0, 0.0, 0.0, 4.0, 4.0]);
        assert_eq!(table[2][0], 2.0);
        assert_eq!(batch.keypoints.num_instances(), 3);

        assert_eq!(batch.image_instances(0).len(), 2);
        assert!(batch.image_instances(1).is_empty());
        let third = batch.image_instances(2);
        assert_eq!(third.bboxes, vec![c]);
        assert_eq!(third.keypoints.instance(0).unwrap()[0], c.center());
    }

    #[test]
    fn stacked_mode_requires_uniform_shapes() {
        let err = collate(
            vec![sample(8, 8, &[]), sample(8, 16, &[])],
            BatchMode::Stacked,
            2,
        )
        .unwrap_err();
        assert!(matches!(err, CollateError::ShapeMismatch { index: 1, .. }));
    }

    #[test]
    fn list_mode_keeps_each_shape() {
        let batch = collate(
            vec![sample(8, 8, &[]), sample(16, 24, &[])],
            BatchMode::List,
            2,
        )
        .unwrap();
        assert_eq!(batch.inputs.image_shape(1), Some(ImageShape::new(16, 24)));
        assert_eq!(batch.inputs.image_shape(2), None);
    }

    #[test]
    fn keypoint_arity_mismatch_is_reported() {
        let s = sample(8, 8, &[BBox::new(0.0, 0.0, 2.0, 2.0)]);
        let err = collate(vec![s], BatchMode::Stacked, 17).unwrap_err();
        assert!(matches!(err, CollateError::Keypoints { index: 0, .. }));
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(matches!(
            collate(Vec::new(), BatchMode::List, 17),
            Err(CollateError::EmptyBatch)
        ));
    }
}
