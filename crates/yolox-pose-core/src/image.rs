use serde::{Deserialize, Serialize};

/// Image extent in pixels, `(height, width)` order like the training pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// `height / width`.
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        self.height as f64 / self.width as f64
    }
}

/// Owned `H x W x C` image, row-major and channel-interleaved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f32>, // len = h*w*c
}

impl ImageTensor {
    /// Image filled with a constant value, e.g. the `114` padding value.
    pub fn filled(height: usize, width: usize, channels: usize, value: f32) -> Self {
        Self {
            height,
            width,
            channels,
            data: vec![value; height * width * channels],
        }
    }

    #[inline]
    pub fn shape(&self) -> ImageShape {
        ImageShape::new(self.height, self.width)
    }

    #[inline]
    pub fn expected_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Buffer length agrees with the declared dimensions.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        if y >= self.height || x >= self.width || c >= self.channels {
            return None;
        }
        self.data
            .get((y * self.width + x) * self.channels + c)
            .copied()
    }
}
