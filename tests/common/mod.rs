#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use image::{ImageOutputFormat, Rgb, RgbImage};
use resnet_predict::client::InferenceBackend;
use resnet_predict::labels::LabelTable;
use resnet_predict::preprocess::Tensor;
use resnet_predict::{PredictError, Predictor};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A single-colour PNG, base64 encoded
pub fn solid_png_base64(width: u32, height: u32, rgb: [u8; 3]) -> String {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    general_purpose::STANDARD.encode(bytes)
}

/// A JPEG with some structure in it, base64 encoded
pub fn pattern_jpeg_base64(width: u32, height: u32) -> String {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(90))
        .unwrap();
    general_purpose::STANDARD.encode(bytes)
}

pub fn labels(n: usize) -> LabelTable {
    LabelTable::new((0..n).map(|i| format!("label-{i}")).collect())
}

/// Returns fixed scores and remembers the shapes it was asked about
#[derive(Default)]
pub struct StubBackend {
    pub scores: Vec<f32>,
    pub ready: bool,
    pub calls: AtomicUsize,
    pub shapes: Mutex<Vec<Vec<usize>>>,
}

impl StubBackend {
    pub fn new(scores: Vec<f32>) -> Self {
        StubBackend {
            scores,
            ready: true,
            ..Default::default()
        }
    }

    /// Scores for `n` classes peaking at `k`
    pub fn peaking_at(n: usize, k: usize) -> Self {
        let mut scores = vec![0.01; n];
        scores[k] = 0.9;
        Self::new(scores)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl InferenceBackend for StubBackend {
    async fn infer(&self, tensor: &Tensor) -> Result<Vec<f32>, PredictError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.shapes.lock().unwrap().push(tensor.shape().to_vec());
        Ok(self.scores.clone())
    }

    async fn ready(&self) -> Result<bool, PredictError> {
        Ok(self.ready)
    }
}

/// Fails every call like an unreachable server
pub struct DownBackend;

#[tonic::async_trait]
impl InferenceBackend for DownBackend {
    async fn infer(&self, _tensor: &Tensor) -> Result<Vec<f32>, PredictError> {
        Err(tonic::Status::unavailable("connection refused").into())
    }

    async fn ready(&self) -> Result<bool, PredictError> {
        Err(tonic::Status::unavailable("connection refused").into())
    }
}

/// Fails every `infer` with an error built by `make`
pub struct FailingBackend {
    pub make: fn() -> PredictError,
}

#[tonic::async_trait]
impl InferenceBackend for FailingBackend {
    async fn infer(&self, _tensor: &Tensor) -> Result<Vec<f32>, PredictError> {
        Err((self.make)())
    }

    async fn ready(&self) -> Result<bool, PredictError> {
        Ok(true)
    }
}

pub fn predictor(backend: Arc<dyn InferenceBackend>, n: usize) -> Predictor {
    Predictor::new(backend, Arc::new(labels(n)))
}
