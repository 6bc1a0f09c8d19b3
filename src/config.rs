//! Service configuration. Read once at startup from an optional TOML file
//! (path in `PREDICT_CONFIG`) and then the environment, which wins.

use crate::decode::ChannelOrder;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_VAR: &str = "PREDICT_CONFIG";

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,actix_web=info,h2=warn,tower=warn";

/// Name of the model's input tensor
pub const DEFAULT_INPUT_NAME: &str = "gpu_0/data_0";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Inference server host
    pub grpc_host: String,
    pub grpc_port: u16,

    /// Model to address on the inference server
    pub model_name: String,
    pub model_version: Option<String>,
    pub input_name: String,

    /// Side length of the square model input
    pub image_size: u32,

    /// Channel order of decoded pixel grids
    pub channel_order: ChannelOrder,

    /// One label per line. Defaults to the bundled ImageNet table.
    pub labels_path: Option<PathBuf>,

    /// Deadline for one `ModelInfer` call. Unset means no deadline.
    pub request_timeout_ms: Option<u64>,

    /// Extra attempts when the inference server is unavailable
    pub max_retries: u32,
    pub retry_backoff_ms: u64,

    pub http_host: String,
    pub http_port: u16,

    /// Largest JSON request body accepted
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            grpc_host: "modelmesh-serving".into(),
            grpc_port: 8033,
            model_name: "resnet".into(),
            model_version: None,
            input_name: DEFAULT_INPUT_NAME.into(),
            image_size: crate::preprocess::DEFAULT_SIZE,
            channel_order: ChannelOrder::default(),
            labels_path: None,
            request_timeout_ms: None,
            max_retries: 0,
            retry_backoff_ms: 100,
            http_host: "0.0.0.0".into(),
            http_port: 8080,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// Load from `PREDICT_CONFIG` (if set) and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            builder = builder.add_source(File::with_name(&path));
        }
        let config = builder
            .add_source(Environment::default().try_parsing(true))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    /// URI tonic connects to
    pub fn grpc_endpoint(&self) -> String {
        format!("http://{}:{}", self.grpc_host, self.grpc_port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map)).try_parsing(true)
    }

    #[test]
    fn defaults_match_the_deployment() {
        let config = Config::builder().add_source(env(&[])).build().unwrap();
        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.grpc_endpoint(), "http://modelmesh-serving:8033");
        assert_eq!(settings.model_name, "resnet");
        assert_eq!(settings.input_name, "gpu_0/data_0");
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn environment_overrides() {
        let config = Config::builder()
            .add_source(env(&[
                ("GRPC_HOST", "localhost"),
                ("GRPC_PORT", "9000"),
                ("MODEL_NAME", "resnet50"),
                ("CHANNEL_ORDER", "bgr"),
                ("REQUEST_TIMEOUT_MS", "1500"),
            ]))
            .build()
            .unwrap();
        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings.grpc_endpoint(), "http://localhost:9000");
        assert_eq!(settings.model_name, "resnet50");
        assert_eq!(settings.channel_order, ChannelOrder::Bgr);
        assert_eq!(settings.request_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn environment_wins_over_file() {
        let toml = r#"
            grpc_host = "from-file"
            max_retries = 3
            labels_path = "/etc/labels.txt"
        "#;
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(env(&[("GRPC_HOST", "from-env")]))
            .build()
            .unwrap();
        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings.grpc_host, "from-env");
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.labels_path, Some(PathBuf::from("/etc/labels.txt")));
    }
}
