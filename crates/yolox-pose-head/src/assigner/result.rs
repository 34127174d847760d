use serde::{Deserialize, Serialize};

/// Outcome of assigning one image's priors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignResult {
    /// Number of ground-truth instances in the image (malformed ones included).
    pub num_gts: usize,
    /// Ground-truth index per prior; `None` is background.
    pub assigned_gt: Vec<Option<usize>>,
    /// IoU between each positive prior's box and its ground truth, 0 elsewhere.
    pub max_overlaps: Vec<f32>,
}

impl AssignResult {
    /// Every prior background.
    pub fn background(num_priors: usize, num_gts: usize) -> Self {
        Self {
            num_gts,
            assigned_gt: vec![None; num_priors],
            max_overlaps: vec![0.0; num_priors],
        }
    }

    #[inline]
    pub fn num_priors(&self) -> usize {
        self.assigned_gt.len()
    }

    pub fn num_pos(&self) -> usize {
        self.assigned_gt.iter().filter(|g| g.is_some()).count()
    }

    #[inline]
    pub fn is_positive(&self, prior: usize) -> bool {
        self.assigned_gt.get(prior).is_some_and(Option::is_some)
    }

    /// `(prior_index, gt_index)` for every positive, in prior order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.assigned_gt
            .iter()
            .enumerate()
            .filter_map(|(p, g)| g.map(|g| (p, g)))
    }

    /// Number of priors matched to each ground truth.
    pub fn matches_per_gt(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_gts];
        for (_, g) in self.pairs() {
            if let Some(c) = counts.get_mut(g) {
                *c += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_has_no_pairs() {
        let r = AssignResult::background(5, 2);
        assert_eq!(r.num_pos(), 0);
        assert_eq!(r.pairs().count(), 0);
        assert_eq!(r.matches_per_gt(), vec![0, 0]);
    }

    #[test]
    fn pairs_follow_prior_order() {
        let r = AssignResult {
            num_gts: 2,
            assigned_gt: vec![None, Some(1), Some(0), Some(1)],
            max_overlaps: vec![0.0, 0.5, 0.7, 0.2],
        };
        assert_eq!(r.pairs().collect::<Vec<_>>(), vec![(1, 1), (2, 0), (3, 1)]);
        assert_eq!(r.matches_per_gt(), vec![1, 2]);
        assert!(r.is_positive(2));
        assert!(!r.is_positive(0));
        assert!(!r.is_positive(10));
    }
}
