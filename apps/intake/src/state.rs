use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::ResumePipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Holds the OCR engine and scoring configuration. Stateless across requests.
    pub pipeline: Arc<ResumePipeline>,
}
