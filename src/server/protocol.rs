use serde::{Deserialize, Serialize};

/// Body of `GET /health/live`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Liveness {
    pub live: bool,
}

/// Body of `GET /health/ready`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,

    /// Why the service is not ready, when it could be determined
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}
