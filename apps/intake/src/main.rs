mod confidence;
mod config;
mod diagnostics;
mod errors;
mod ingest;
mod models;
mod parsing;
mod pipeline;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::ingest::ocr::{OcrEngine, TesseractCliEngine};
use crate::pipeline::ResumePipeline;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting intake v{}", env!("CARGO_PKG_VERSION"));

    // OCR shells out per request; nothing is probed at startup
    let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractCliEngine::new(
        &config.tesseract_path,
        &config.pdftoppm_path,
    ));
    info!(
        tesseract = %config.tesseract_path,
        pdftoppm = %config.pdftoppm_path,
        "OCR engine configured"
    );

    let settings = config.pipeline_settings();
    info!(
        timeout_ms = settings.defaults.timeout_ms,
        max_file_size_bytes = settings.defaults.max_file_size_bytes,
        ocr = settings.defaults.enable_ocr,
        "Pipeline defaults"
    );
    let pipeline = Arc::new(ResumePipeline::new(ocr, settings));

    let state = AppState {
        config: config.clone(),
        pipeline,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
