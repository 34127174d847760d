use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Training stage; the auxiliary L1 box term only runs in [`TrainingPhase::Stage1`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    #[default]
    Stage1,
    /// The last `num_last_epochs` epochs.
    Stage2,
}

impl TrainingPhase {
    /// Phase of the 0-based `epoch`.
    pub fn for_epoch(epoch: usize, max_epochs: usize, num_last_epochs: usize) -> Self {
        if epoch.saturating_add(num_last_epochs) >= max_epochs {
            Self::Stage2
        } else {
            Self::Stage1
        }
    }

    #[inline]
    pub fn uses_bbox_aux(self) -> bool {
        matches!(self, Self::Stage1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseSchedule {
    pub max_epochs: usize,
    pub num_last_epochs: usize,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self {
            max_epochs: 100,
            num_last_epochs: 15,
        }
    }
}

impl PhaseSchedule {
    pub fn phase(&self, epoch: usize) -> TrainingPhase {
        TrainingPhase::for_epoch(epoch, self.max_epochs, self.num_last_epochs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_epochs == 0 {
            return Err(ConfigError::invalid("schedule.max_epochs", "must be >= 1"));
        }
        if self.num_last_epochs > self.max_epochs {
            return Err(ConfigError::invalid(
                "schedule.num_last_epochs",
                "must not exceed max_epochs",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_epochs_switch_to_stage_two() {
        let s = PhaseSchedule::default();
        assert_eq!(s.phase(0), TrainingPhase::Stage1);
        assert_eq!(s.phase(84), TrainingPhase::Stage1);
        assert_eq!(s.phase(85), TrainingPhase::Stage2);
        assert_eq!(s.phase(99), TrainingPhase::Stage2);
        assert_eq!(s.phase(500), TrainingPhase::Stage2);
        assert!(s.phase(10).uses_bbox_aux());
        assert!(!s.phase(90).uses_bbox_aux());
    }

    #[test]
    fn schedule_without_last_epochs_never_switches_early() {
        assert_eq!(TrainingPhase::for_epoch(99, 100, 0), TrainingPhase::Stage1);
        assert_eq!(TrainingPhase::for_epoch(100, 100, 0), TrainingPhase::Stage2);
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        let s = PhaseSchedule {
            max_epochs: 10,
            num_last_epochs: 11,
        };
        assert!(s.validate().is_err());
    }
}
