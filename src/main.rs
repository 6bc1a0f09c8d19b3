use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use resnet_predict::client::{GrpcInferenceClient, InferenceBackend};
use resnet_predict::config::{Settings, DEFAULT_LOG_FILTER};
use resnet_predict::labels::LabelTable;
use resnet_predict::preprocess::Preprocessor;
use resnet_predict::server;
use resnet_predict::Predictor;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::load().context("failed to load configuration")?;
    info!("starting with {settings:?}");

    let labels = match &settings.labels_path {
        Some(path) => LabelTable::from_file(path)
            .with_context(|| format!("failed to read labels from {}", path.display()))?,
        None => LabelTable::imagenet().clone(),
    };
    info!("loaded {} labels", labels.len());

    let client = GrpcInferenceClient::new(&settings).context("invalid inference endpoint")?;
    info!("classifying with model {}", client.model_name());
    let backend: Arc<dyn InferenceBackend> = Arc::new(client);

    let predictor = web::Data::new(
        Predictor::new(backend, Arc::new(labels))
            .with_preprocessor(Preprocessor::new(settings.image_size))
            .with_channel_order(settings.channel_order),
    );

    let max_body_bytes = settings.max_body_bytes;
    let bind = (settings.http_host.clone(), settings.http_port);
    info!("listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(predictor.clone())
            .app_data(server::json_config(max_body_bytes))
            .wrap(middleware::Logger::default())
            .configure(server::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
