//! HTTP routes. `POST /predict` is the inference entry point; the health
//! routes are meant for orchestrator probes.

use super::protocol::{Liveness, Readiness};
use super::WebError;
use crate::pipeline::{PredictRequest, Predictor};
use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::*;

type Result<T> = std::result::Result<T, WebError>;

#[post("/predict")]
pub async fn predict(
    req: web::Json<PredictRequest>,
    predictor: web::Data<Predictor>,
) -> Result<impl Responder> {
    debug!("got prediction request {:?}", req);

    let prediction = predictor.predict(&req).await.map_err(|e| {
        warn!("prediction failed: {e}");
        e
    })?;

    info!("finished serving prediction request");
    Ok(web::Json(prediction))
}

/// The process is up. Says nothing about the inference server.
#[get("/health/live")]
pub async fn live() -> impl Responder {
    web::Json(Liveness { live: true })
}

/// Ready once the inference server and the configured model both are
#[get("/health/ready")]
pub async fn ready(predictor: web::Data<Predictor>) -> HttpResponse {
    match predictor.ready().await {
        Ok(true) => HttpResponse::Ok().json(Readiness {
            ready: true,
            reason: None,
        }),
        Ok(false) => HttpResponse::ServiceUnavailable().json(Readiness {
            ready: false,
            reason: Some("model is not ready".into()),
        }),
        Err(e) => {
            warn!("readiness check failed: {e}");
            HttpResponse::ServiceUnavailable().json(Readiness {
                ready: false,
                reason: Some(e.to_string()),
            })
        }
    }
}
