//! The JSON web front end. Translates HTTP requests into `Predictor` calls
//! and pipeline errors into HTTP status codes.

use crate::error::PredictError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use std::collections::HashMap;

mod protocol;
pub mod routes;

pub use protocol::{Liveness, Readiness};

#[derive(Debug)]
pub struct WebError {
    err: PredictError,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let err = HashMap::from([("errors", vec![self.to_string()])]);

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(err)
    }

    fn status_code(&self) -> StatusCode {
        match self.err {
            PredictError::Decode(_) | PredictError::Shape { .. } => StatusCode::BAD_REQUEST,
            PredictError::Transport(_) => StatusCode::BAD_GATEWAY,
            PredictError::ResponseFormat(_)
            | PredictError::NoScores
            | PredictError::LabelOutOfRange { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PredictError> for WebError {
    fn from(err: PredictError) -> WebError {
        WebError { err }
    }
}

/// JSON extractor settings: body size limit and errors in the same
/// `{"errors": [...]}` shape as pipeline failures
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            let body = HashMap::from([("errors", vec![err.to_string()])]);
            let status = match err {
                JsonPayloadError::OverflowKnownLength { .. }
                | JsonPayloadError::Overflow { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            let response = HttpResponse::build(status)
                .insert_header(ContentType::json())
                .json(body);
            actix_web::error::InternalError::from_response(err, response).into()
        })
}

/// Register every route on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(routes::predict)
        .service(routes::live)
        .service(routes::ready);
}
