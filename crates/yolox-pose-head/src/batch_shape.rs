use serde::{Deserialize, Serialize};
use yolox_pose_core::ImageShape;

use crate::ConfigError;

/// Rectangular-batch padding for evaluation.
///
/// Images are sorted by aspect ratio and grouped into batches; each batch
/// gets the smallest padded shape, a multiple of `size_divisor`, that fits
/// all its images once they are resized to `img_size` on the long side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchShapePolicy {
    pub batch_size: usize,
    pub img_size: usize,
    pub size_divisor: usize,
    pub extra_pad_ratio: f64,
}

impl Default for BatchShapePolicy {
    fn default() -> Self {
        Self {
            batch_size: 32,
            img_size: 640,
            size_divisor: 32,
            extra_pad_ratio: 0.5,
        }
    }
}

/// Result of [`BatchShapePolicy::apply`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchShapes {
    /// Dataset indices in batch order.
    pub order: Vec<usize>,
    /// Padded input shape of each image, parallel to `order`.
    pub shapes: Vec<ImageShape>,
}

impl BatchShapePolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be >= 1"));
        }
        if self.img_size == 0 || self.size_divisor == 0 {
            return Err(ConfigError::invalid(
                "img_size",
                "img_size and size_divisor must be >= 1",
            ));
        }
        if !self.extra_pad_ratio.is_finite() || self.extra_pad_ratio < 0.0 {
            return Err(ConfigError::invalid("extra_pad_ratio", "must be >= 0"));
        }
        Ok(())
    }

    /// Sort `shapes` by `h / w` and assign every image its batch shape.
    pub fn apply(&self, shapes: &[ImageShape]) -> Result<BatchShapes, ConfigError> {
        self.validate()?;
        let mut order: Vec<usize> = (0..shapes.len()).collect();
        order.sort_by(|&a, &b| shapes[a].aspect_ratio().total_cmp(&shapes[b].aspect_ratio()));

        let mut out = Vec::with_capacity(order.len());
        for chunk in order.chunks(self.batch_size) {
            let ratios = chunk.iter().map(|&i| shapes[i].aspect_ratio());
            let (min, max) = ratios.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r), hi.max(r))
            });
            let (sh, sw) = if max < 1.0 {
                (max, 1.0)
            } else if min > 1.0 {
                (1.0, 1.0 / min)
            } else {
                (1.0, 1.0)
            };
            let shape = ImageShape::new(self.padded(sh), self.padded(sw));
            out.extend(std::iter::repeat_n(shape, chunk.len()));
        }
        Ok(BatchShapes { order, shapes: out })
    }

    fn padded(&self, scale: f64) -> usize {
        let d = self.size_divisor as f64;
        ((scale * self.img_size as f64 / d + self.extra_pad_ratio).ceil() * d) as usize
    }
}
