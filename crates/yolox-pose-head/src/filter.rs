use log::debug;
use serde::{Deserialize, Serialize};
use yolox_pose_core::InstanceSet;

/// Ground-truth filtering applied before a sample enters a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Minimum box `(width, height)`.
    pub min_gt_bbox_wh: (f32, f32),
    pub by_keypoints: bool,
    /// Minimum labelled keypoints when `by_keypoints` is set.
    pub min_keypoints: usize,
    /// Keep a sample whose instances were all removed.
    pub keep_empty: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_gt_bbox_wh: (1.0, 1.0),
            by_keypoints: true,
            min_keypoints: 1,
            keep_empty: false,
        }
    }
}

/// Drop tiny boxes and under-annotated instances.
///
/// Returns `None` when nothing survives and `keep_empty` is false, in which
/// case the caller skips the sample.
pub fn filter_annotations(gt: &InstanceSet, params: &FilterParams) -> Option<InstanceSet> {
    let counts = gt.visibility.labeled_counts();
    let (min_w, min_h) = params.min_gt_bbox_wh;
    let keep: Vec<usize> = (0..gt.len())
        .filter(|&i| {
            let b = &gt.bboxes[i];
            let size_ok = b.width() >= min_w && b.height() >= min_h;
            let kpt_ok = !params.by_keypoints
                || counts.get(i).copied().unwrap_or(0) >= params.min_keypoints;
            size_ok && kpt_ok
        })
        .collect();
    if keep.len() < gt.len() {
        debug!("filtered {} of {} instances", gt.len() - keep.len(), gt.len());
    }
    if keep.is_empty() && !params.keep_empty {
        return None;
    }
    Some(InstanceSet {
        bboxes: keep.iter().map(|&i| gt.bboxes[i]).collect(),
        labels: keep.iter().map(|&i| gt.labels[i]).collect(),
        keypoints: gt.keypoints.select_instances(&keep),
        visibility: gt.visibility.select_instances(&keep),
    })
}
