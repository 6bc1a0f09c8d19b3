//! Failures of the prediction pipeline. Nothing in the pipeline recovers from
//! these locally; they travel up to whoever called `predict`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PredictError>;

/// Why an input could not be turned into pixels
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unrecognized image data: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("pixel grid has shape {actual:?}, expected {expected}")]
    Shape {
        expected: &'static str,
        actual: Vec<usize>,
    },

    #[error("inference call failed: {0}")]
    Transport(#[from] tonic::Status),

    #[error("malformed inference response: {0}")]
    ResponseFormat(String),

    #[error("inference response carried no usable class scores")]
    NoScores,

    #[error("class index {index} is outside the label table ({classes} labels)")]
    LabelOutOfRange { index: usize, classes: usize },
}

impl From<base64::DecodeError> for PredictError {
    fn from(err: base64::DecodeError) -> Self {
        PredictError::Decode(err.into())
    }
}

impl From<image::ImageError> for PredictError {
    fn from(err: image::ImageError) -> Self {
        PredictError::Decode(err.into())
    }
}
