use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Per-term loss weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub loss_cls: f32,
    pub loss_bbox: f32,
    pub loss_obj: f32,
    pub loss_bbox_aux: f32,
    /// OKS similarities sit close to 1, hence the large weight.
    pub loss_kpt: f32,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            loss_cls: 1.0,
            loss_bbox: 5.0,
            loss_obj: 1.0,
            loss_bbox_aux: 1.0,
            loss_kpt: 70.0,
        }
    }
}

/// How an OKS similarity turns into a loss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OksMode {
    /// `1 - oks`
    #[default]
    Linear,
    /// `-ln(oks)`
    Log,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossParams {
    pub weights: LossWeights,
    /// Lower bound of the IoU in the box loss.
    pub iou_eps: f32,
    pub oks_mode: OksMode,
    /// Added to the instance area in the OKS denominator.
    pub oks_eps: f32,
    /// Added inside the log of the auxiliary L1 size target.
    pub bbox_aux_eps: f32,
}

impl Default for LossParams {
    fn default() -> Self {
        Self {
            weights: LossWeights::default(),
            iou_eps: 1e-16,
            oks_mode: OksMode::Linear,
            oks_eps: 1e-8,
            bbox_aux_eps: 1e-8,
        }
    }
}

impl LossParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        for (name, v) in [
            ("loss.weights.loss_cls", w.loss_cls),
            ("loss.weights.loss_bbox", w.loss_bbox),
            ("loss.weights.loss_obj", w.loss_obj),
            ("loss.weights.loss_bbox_aux", w.loss_bbox_aux),
            ("loss.weights.loss_kpt", w.loss_kpt),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::invalid(name, "must be finite and >= 0"));
            }
        }
        for (name, v) in [
            ("loss.iou_eps", self.iou_eps),
            ("loss.oks_eps", self.oks_eps),
            ("loss.bbox_aux_eps", self.bbox_aux_eps),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::invalid(name, "must be > 0"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_weight_is_rejected() {
        let mut p = LossParams::default();
        p.validate().unwrap();
        p.weights.loss_kpt = -1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn weights_are_settable_from_json() {
        let p: LossParams =
            serde_json::from_str(r#"{"weights": {"loss_kpt": 30.0}, "oks_mode": "log"}"#).unwrap();
        assert_eq!(p.weights.loss_kpt, 30.0);
        assert_eq!(p.weights.loss_bbox, 5.0);
        assert_eq!(p.oks_mode, OksMode::Log);
        assert!(serde_json::from_str::<LossParams>(r#"{"oks_mode": "cubic"}"#).is_err());
    }
}
