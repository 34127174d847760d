use serde::{Deserialize, Serialize};

/// Weighted loss terms of one training step.
///
/// Every term is already multiplied by its weight and divided by the number
/// of positives, so `total` is their plain sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossComponents {
    pub total: f32,
    pub loss_cls: f32,
    pub loss_bbox: f32,
    pub loss_obj: f32,
    /// `None` outside the first training stage.
    pub loss_bbox_aux: Option<f32>,
    pub loss_kpt: f32,
    /// Positive priors across the batch.
    pub num_pos: usize,
}

impl LossComponents {
    /// `(name, value)` pairs in a fixed order, for logging.
    pub fn named(&self) -> Vec<(&'static str, f32)> {
        let mut out = vec![
            ("loss_cls", self.loss_cls),
            ("loss_bbox", self.loss_bbox),
            ("loss_obj", self.loss_obj),
        ];
        if let Some(aux) = self.loss_bbox_aux {
            out.push(("loss_bbox_aux", aux));
        }
        out.push(("loss_kpt", self.loss_kpt));
        out
    }
}
