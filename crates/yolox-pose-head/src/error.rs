use yolox_pose_core::KeypointError;

/// Errors returned by the head's assignment, decoding and loss code.
///
/// Every variant signals a configuration or wiring problem; data issues
/// such as malformed boxes or images without positives are handled in place.
#[derive(thiserror::Error, Debug)]
pub enum HeadError {
    #[error("head predicts {head} keypoints but the dataset provides {dataset}")]
    KeypointCountMismatch { head: usize, dataset: usize },
    #[error("{predictions} predictions for {priors} priors")]
    PriorCountMismatch { predictions: usize, priors: usize },
    #[error("prediction {index} has {got} class logits, expected {expected}")]
    ClassCountMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("{predictions} prediction sets for {images} images")]
    ImageCountMismatch { predictions: usize, images: usize },
    #[error(transparent)]
    Keypoints(#[from] KeypointError),
}
