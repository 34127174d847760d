use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Configuration for the SimOTA assigner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOtaParams {
    /// Half-size of the center region around each ground truth, in strides.
    pub center_radius: f32,
    /// Number of best IoUs summed to estimate the dynamic `k`.
    pub candidate_topk: usize,
    /// Weight of the `-ln(IoU)` term.
    pub iou_weight: f32,
    /// Weight of the classification cross-entropy term.
    pub cls_weight: f32,
    /// Cost added to pairs outside the box-and-center region.
    pub large_penalty: f32,
    /// Added to the IoU before taking the logarithm.
    pub iou_eps: f32,
}

impl Default for SimOtaParams {
    fn default() -> Self {
        Self {
            center_radius: 2.5,
            candidate_topk: 10,
            iou_weight: 3.0,
            cls_weight: 1.0,
            large_penalty: 1e5,
            iou_eps: 1e-7,
        }
    }
}

impl SimOtaParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.center_radius.is_finite() || self.center_radius <= 0.0 {
            return Err(ConfigError::invalid("assigner.center_radius", "must be > 0"));
        }
        if self.candidate_topk == 0 {
            return Err(ConfigError::invalid("assigner.candidate_topk", "must be >= 1"));
        }
        for (name, v) in [
            ("assigner.iou_weight", self.iou_weight),
            ("assigner.cls_weight", self.cls_weight),
            ("assigner.large_penalty", self.large_penalty),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::invalid(name, "must be finite and >= 0"));
            }
        }
        if !self.iou_eps.is_finite() || self.iou_eps <= 0.0 {
            return Err(ConfigError::invalid("assigner.iou_eps", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimOtaParams::default().validate().unwrap();
    }

    #[test]
    fn zero_topk_is_rejected() {
        let p = SimOtaParams {
            candidate_topk: 0,
            ..SimOtaParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let p: SimOtaParams = serde_json::from_str(r#"{"center_radius": 1.5}"#).unwrap();
        assert_eq!(p.center_radius, 1.5);
        assert_eq!(p.candidate_topk, 10);
    }
}
