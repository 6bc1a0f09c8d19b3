pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod labels;
pub mod pipeline;
pub mod preprocess;
pub mod server;

pub use error::{PredictError, Result};
pub use pipeline::{PredictRequest, Prediction, Predictor};

/// Generated KServe v2 (`inference.GRPCInferenceService`) types
#[allow(clippy::all)]
pub mod rpc {
    tonic::include_proto!("inference");
}
