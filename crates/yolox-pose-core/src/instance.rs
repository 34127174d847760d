use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{BBox, KeypointError, KeypointVisibility, Keypoints, Visibility};

/// One annotated object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub bbox: BBox,
    pub label: usize,
    pub keypoints: Vec<Point2<f32>>,
    pub visibility: Vec<Visibility>,
}

impl Instance {
    /// Number of labelled keypoints.
    pub fn num_labeled(&self) -> usize {
        self.visibility.iter().filter(|v| v.is_labeled()).count()
    }
}

/// Ground truth of one image in structure-of-arrays form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceSet {
    pub bboxes: Vec<BBox>,
    pub labels: Vec<usize>,
    pub keypoints: Keypoints,
    pub visibility: KeypointVisibility,
}

impl InstanceSet {
    pub fn empty(num_keypoints: usize) -> Self {
        Self {
            bboxes: Vec::new(),
            labels: Vec::new(),
            keypoints: Keypoints::empty(num_keypoints),
            visibility: KeypointVisibility::empty(num_keypoints),
        }
    }

    /// Pack instances; every instance must carry exactly `num_keypoints`
    /// coordinates and visibility flags.
    pub fn from_instances(
        instances: &[Instance],
        num_keypoints: usize,
    ) -> Result<Self, KeypointError> {
        let mut set = Self::empty(num_keypoints);
        for inst in instances {
            set.push(inst)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, inst: &Instance) -> Result<(), KeypointError> {
        if inst.visibility.len() != inst.keypoints.len() {
            return Err(KeypointError::CountMismatch {
                expected: inst.keypoints.len(),
                got: inst.visibility.len(),
            });
        }
        self.keypoints.push_instance(&inst.keypoints)?;
        self.visibility.push_instance(&inst.visibility)?;
        self.bboxes.push(inst.bbox);
        self.labels.push(inst.label);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    /// Check that the parallel arrays agree in length.
    pub fn check_layout(&self) -> Result<(), KeypointError> {
        let n = self.bboxes.len();
        if self.labels.len() != n {
            return Err(KeypointError::InstanceMismatch {
                expected: n,
                got: self.labels.len(),
            });
        }
        if self.keypoints.num_instances() != n {
            return Err(KeypointError::InstanceMismatch {
                expected: n,
                got: self.keypoints.num_instances(),
            });
        }
        self.keypoints.ensure_same_layout(&self.visibility)
    }

    /// Instance usable as a matching target: valid box, finite keypoints,
    /// label below `num_classes`.
    pub fn is_well_formed(&self, index: usize, num_classes: usize) -> bool {
        let Some(bbox) = self.bboxes.get(index) else {
            return false;
        };
        let label_ok = self.labels.get(index).is_some_and(|&l| l < num_classes);
        let kpt_ok = self.keypoints.is_empty() || self.keypoints.instance_is_finite(index);
        bbox.is_valid() && label_ok && kpt_ok
    }

    /// Unpack back into per-instance records.
    pub fn to_instances(&self) -> Vec<Instance> {
        (0..self.len())
            .map(|i| Instance {
                bbox: self.bboxes[i],
                label: self.labels[i],
                keypoints: self.keypoints.instance(i).map(<[_]>::to_vec).unwrap_or_default(),
                visibility: self
                    .visibility
                    .instance(i)
                    .map(<[_]>::to_vec)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(x: f32, k: usize) -> Instance {
        Instance {
            bbox: BBox::new(x, x, x + 10.0, x + 20.0),
            label: 0,
            keypoints: (0..k).map(|i| Point2::new(x + i as f32, x)).collect(),
            visibility: vec![Visibility::Visible; k],
        }
    }

    #[test]
    fn pack_and_unpack() {
        let insts = vec![person(0.0, 3), person(5.0, 3)];
        let set = InstanceSet::from_instances(&insts, 3).unwrap();
        assert_eq!(set.len(), 2);
        set.check_layout().unwrap();
        assert_eq!(set.to_instances(), insts);
    }

    #[test]
    fn keypoint_count_must_match() {
        let insts = vec![person(0.0, 3), person(5.0, 4)];
        assert!(matches!(
            InstanceSet::from_instances(&insts, 3),
            Err(KeypointError::CountMismatch {
                expected: 3,
                got: 4
            })
        ));
    }

    #[test]
    fn malformed_instances_are_flagged() {
        let mut bad_box = person(0.0, 2);
        bad_box.bbox = BBox::new(5.0, 5.0, 5.0, 9.0);
        let mut bad_kpt = person(0.0, 2);
        bad_kpt.keypoints[1].x = f32::NAN;
        let mut bad_label = person(0.0, 2);
        bad_label.label = 3;
        let set =
            InstanceSet::from_instances(&[person(0.0, 2), bad_box, bad_kpt, bad_label], 2).unwrap();
        let flags: Vec<bool> = (0..4).map(|i| set.is_well_formed(i, 1)).collect();
        assert_eq!(flags, vec![true, false, false, false]);
        assert!(!set.is_well_formed(9, 1));
    }
}
