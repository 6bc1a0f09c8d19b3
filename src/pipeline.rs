//! `predict`: base64 image in, class label out.
//!
//! decode -> resize -> normalize -> batch -> remote `ModelInfer` -> argmax ->
//! label lookup, strictly in that order. The only suspension point is the
//! remote call.

use crate::client::InferenceBackend;
use crate::decode::{self, ChannelOrder};
use crate::error::Result;
use crate::labels::{Class, LabelTable};
use crate::preprocess::{Preprocessor, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::*;

/// Body of a prediction request. Keys other than `image` are ignored.
#[derive(Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    /// Base64 of an encoded image (JPEG, PNG, ...)
    pub image: String,
}

impl Debug for PredictRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PredictRequest {{ image: <{} bytes> }}", self.image.len())
    }
}

impl PredictRequest {
    pub fn new(image: impl Into<String>) -> Self {
        PredictRequest {
            image: image.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: String,
}

/// The whole pipeline. Holds no per-request state; one instance serves every
/// request concurrently.
pub struct Predictor {
    backend: Arc<dyn InferenceBackend>,
    labels: Arc<LabelTable>,
    preprocessor: Preprocessor,
    channel_order: ChannelOrder,
}

impl Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("labels", &self.labels.len())
            .field("preprocessor", &self.preprocessor)
            .field("channel_order", &self.channel_order)
            .finish()
    }
}

impl Predictor {
    pub fn new(backend: Arc<dyn InferenceBackend>, labels: Arc<LabelTable>) -> Self {
        Predictor {
            backend,
            labels,
            preprocessor: Preprocessor::default(),
            channel_order: ChannelOrder::default(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    /// Run the pipeline on a request body
    #[tracing::instrument(skip_all)]
    pub async fn predict(&self, body: &PredictRequest) -> Result<Prediction> {
        let class = self.classify(&body.image).await?;
        Ok(Prediction {
            prediction: class.label,
        })
    }

    /// Like `predict`, but keeps the class index and score
    pub async fn classify(&self, image: &str) -> Result<Class> {
        let tensor = self.preprocess(image)?;
        let scores = self.backend.infer(&tensor).await?;
        let class = self.labels.resolve(&scores)?;
        info!(
            "predicted class {} ({:?}) with score {}",
            class.index, class.label, class.score
        );
        Ok(class)
    }

    /// Decode and preprocess without calling the model
    pub fn preprocess(&self, image: &str) -> Result<Tensor> {
        let grid = decode::decode(image, self.channel_order)?;
        debug!("decoded {}x{} image", grid.width(), grid.height());
        self.preprocessor.run(&grid)
    }

    /// Whether the backend can take requests
    pub async fn ready(&self) -> Result<bool> {
        self.backend.ready().await
    }
}
