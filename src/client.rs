//! The remote half of the pipeline: ships a tensor to a KServe v2 inference
//! server over gRPC and reads the class scores back.

use crate::config::Settings;
use crate::error::{PredictError, Result};
use crate::preprocess::Tensor;
use crate::rpc::grpc_inference_service_client::GrpcInferenceServiceClient;
use crate::rpc::model_infer_request::InferInputTensor;
use crate::rpc::{
    InferTensorContents, ModelInferRequest, ModelInferResponse, ModelReadyRequest,
    ServerLiveRequest, ServerReadyRequest,
};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request};
use tracing::*;

/// Datatype string of the input tensor
pub const FP32: &str = "FP32";

/// Anything that can turn an input tensor into class scores. The pipeline
/// only talks to this trait so tests can swap the network out.
#[tonic::async_trait]
pub trait InferenceBackend: Send + Sync {
    /// One score per class
    async fn infer(&self, tensor: &Tensor) -> Result<Vec<f32>>;

    /// Whether the backend can currently serve `infer`
    async fn ready(&self) -> Result<bool>;
}

/// How often to re-send a request the server could not take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 0,
            backoff: Duration::from_millis(100),
        }
    }
}

/// A client for `inference.GRPCInferenceService`. The underlying channel is
/// opened once and cloned per call; clones share one HTTP/2 connection and
/// are safe to use from concurrent requests.
#[derive(Debug, Clone)]
pub struct GrpcInferenceClient {
    client: GrpcInferenceServiceClient<Channel>,
    model_name: String,
    model_version: Option<String>,
    input_name: String,
    retry: RetryPolicy,
}

impl GrpcInferenceClient {
    /// Build a lazily connecting client. The first call dials the server, so
    /// this succeeds even while the inference server is still starting.
    pub fn new(settings: &Settings) -> std::result::Result<Self, tonic::transport::Error> {
        let mut endpoint = Endpoint::from_shared(settings.grpc_endpoint())?
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true);
        if let Some(timeout) = settings.request_timeout() {
            endpoint = endpoint.timeout(timeout);
        }

        info!(
            "inference client targeting {} (model {})",
            settings.grpc_endpoint(),
            settings.model_name
        );

        Ok(Self::with_channel(endpoint.connect_lazy(), settings))
    }

    pub fn with_channel(channel: Channel, settings: &Settings) -> Self {
        GrpcInferenceClient {
            client: GrpcInferenceServiceClient::new(channel),
            model_name: settings.model_name.clone(),
            model_version: settings.model_version.clone(),
            input_name: settings.input_name.clone(),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                backoff: settings.retry_backoff(),
            },
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// A `ModelInferRequest` carrying `tensor` as the single named input
    pub fn build_request(&self, tensor: &Tensor) -> ModelInferRequest {
        let input = InferInputTensor {
            name: self.input_name.clone(),
            datatype: FP32.into(),
            shape: tensor.shape().iter().map(|&d| d as i64).collect(),
            contents: Some(InferTensorContents {
                fp32_contents: tensor.iter().copied().collect(),
                ..Default::default()
            }),
            ..Default::default()
        };

        ModelInferRequest {
            model_name: self.model_name.clone(),
            model_version: self.model_version.clone().unwrap_or_default(),
            inputs: vec![input],
            ..Default::default()
        }
    }

    /// Send `ModelInfer`, retrying only while the server reports itself
    /// unavailable and the retry budget lasts
    pub async fn model_infer(&self, mut request: ModelInferRequest) -> Result<ModelInferResponse> {
        let mut attempt = 0;
        loop {
            let payload = if attempt < self.retry.max_retries {
                request.clone()
            } else {
                std::mem::take(&mut request)
            };

            let mut client = self.client.clone();
            match client.model_infer(Request::new(payload)).await {
                Ok(response) => return Ok(response.into_inner()),
                Err(status)
                    if status.code() == Code::Unavailable && attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    warn!(
                        "inference server unavailable ({}), retry {attempt}/{}",
                        status.message(),
                        self.retry.max_retries
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(status) => return Err(status.into()),
            }
        }
    }

    pub async fn server_live(&self) -> Result<bool> {
        let mut client = self.client.clone();
        let response = client.server_live(Request::new(ServerLiveRequest {})).await?;
        Ok(response.into_inner().live)
    }

    pub async fn server_ready(&self) -> Result<bool> {
        let mut client = self.client.clone();
        let response = client
            .server_ready(Request::new(ServerReadyRequest {}))
            .await?;
        Ok(response.into_inner().ready)
    }

    pub async fn model_ready(&self) -> Result<bool> {
        let mut client = self.client.clone();
        let request = ModelReadyRequest {
            name: self.model_name.clone(),
            version: self.model_version.clone().unwrap_or_default(),
        };
        let response = client.model_ready(Request::new(request)).await?;
        Ok(response.into_inner().ready)
    }
}

#[tonic::async_trait]
impl InferenceBackend for GrpcInferenceClient {
    #[tracing::instrument(skip_all)]
    async fn infer(&self, tensor: &Tensor) -> Result<Vec<f32>> {
        let request = self.build_request(tensor);
        debug!(
            "sending ModelInfer to {} with input shape {:?}",
            self.model_name,
            tensor.shape()
        );
        let response = self.model_infer(request).await?;
        let scores = parse_output(&response)?;
        debug!("received {} scores", scores.len());
        Ok(scores)
    }

    async fn ready(&self) -> Result<bool> {
        Ok(self.server_ready().await? && self.model_ready().await?)
    }
}

/// Read the scores of the first output. The raw little-endian buffer is what
/// servers send by default; typed `fp32_contents` is accepted when no raw
/// buffer is present. An output declared as anything but FP32 is rejected.
pub fn parse_output(response: &ModelInferResponse) -> Result<Vec<f32>> {
    if let Some(output) = response.outputs.first() {
        if !output.datatype.is_empty() && output.datatype != FP32 {
            return Err(PredictError::ResponseFormat(format!(
                "output {:?} is {}, expected {FP32}",
                output.name, output.datatype
            )));
        }
    }

    if let Some(raw) = response.raw_output_contents.first() {
        return parse_raw_fp32(raw);
    }

    response
        .outputs
        .first()
        .and_then(|output| output.contents.as_ref())
        .map(|contents| contents.fp32_contents.clone())
        .filter(|scores| !scores.is_empty())
        .ok_or_else(|| PredictError::ResponseFormat("response carries no output buffer".into()))
}

/// Reinterpret a byte buffer as little-endian `f32`s
pub fn parse_raw_fp32(raw: &[u8]) -> Result<Vec<f32>> {
    if raw.len() % 4 != 0 {
        return Err(PredictError::ResponseFormat(format!(
            "raw output of {} bytes is not a whole number of FP32 values",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::model_infer_response::InferOutputTensor;
    use ndarray::Array4;

    fn client() -> GrpcInferenceClient {
        let settings = Settings {
            model_version: Some("2".into()),
            ..Settings::default()
        };
        let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        GrpcInferenceClient::with_channel(channel, &settings)
    }

    #[tokio::test]
    async fn request_names_the_input_and_model() {
        let tensor =
            Array4::from_shape_fn((1, 3, 4, 4), |(_, c, y, x)| (c * 16 + y * 4 + x) as f32);
        let request = client().build_request(&tensor);

        assert_eq!(request.model_name, "resnet");
        assert_eq!(request.model_version, "2");
        assert_eq!(request.inputs.len(), 1);

        let input = &request.inputs[0];
        assert_eq!(input.name, "gpu_0/data_0");
        assert_eq!(input.datatype, "FP32");
        assert_eq!(input.shape, vec![1, 3, 4, 4]);

        let values = &input.contents.as_ref().unwrap().fp32_contents;
        assert_eq!(values.len(), 48);
        // Row-major: channel, then row, then column
        assert_eq!(values[0], 0.0);
        assert_eq!(values[5], 5.0);
        assert_eq!(values[16], 16.0);
    }

    #[test]
    fn raw_output_is_little_endian_fp32() {
        let raw: Vec<u8> = [1.5f32, -2.0, 0.25]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let response = ModelInferResponse {
            raw_output_contents: vec![raw],
            ..Default::default()
        };
        assert_eq!(parse_output(&response).unwrap(), vec![1.5, -2.0, 0.25]);
    }

    #[test]
    fn ragged_raw_output_is_rejected() {
        let response = ModelInferResponse {
            raw_output_contents: vec![vec![0u8; 7]],
            ..Default::default()
        };
        assert!(matches!(
            parse_output(&response),
            Err(PredictError::ResponseFormat(_))
        ));
    }

    #[test]
    fn missing_output_is_rejected() {
        let response = ModelInferResponse::default();
        assert!(matches!(
            parse_output(&response),
            Err(PredictError::ResponseFormat(_))
        ));
    }

    #[test]
    fn non_fp32_output_is_rejected() {
        let response = ModelInferResponse {
            outputs: vec![InferOutputTensor {
                name: "softmaxout_1".into(),
                datatype: "FP16".into(),
                shape: vec![1, 2],
                ..Default::default()
            }],
            raw_output_contents: vec![vec![0u8; 4]],
            ..Default::default()
        };
        match parse_output(&response) {
            Err(PredictError::ResponseFormat(msg)) => assert!(msg.contains("FP16")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn raw_output_with_declared_fp32_is_accepted() {
        let response = ModelInferResponse {
            outputs: vec![InferOutputTensor {
                name: "softmaxout_1".into(),
                datatype: FP32.into(),
                shape: vec![1, 1],
                ..Default::default()
            }],
            raw_output_contents: vec![3.0f32.to_le_bytes().to_vec()],
            ..Default::default()
        };
        assert_eq!(parse_output(&response).unwrap(), vec![3.0]);
    }

    #[test]
    fn typed_contents_are_used_without_raw_buffer() {
        let response = ModelInferResponse {
            outputs: vec![InferOutputTensor {
                name: "softmaxout_1".into(),
                datatype: FP32.into(),
                shape: vec![1, 2],
                contents: Some(InferTensorContents {
                    fp32_contents: vec![0.2, 0.8],
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(parse_output(&response).unwrap(), vec![0.2, 0.8]);
    }
}
