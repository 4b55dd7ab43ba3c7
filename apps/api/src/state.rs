use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::curation::pipeline::DigestPipeline;
use crate::llm_client::LanguageModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Used directly by the interest interview; the pipeline holds its own handle.
    pub llm: Arc<dyn LanguageModel>,
    pub pipeline: Arc<DigestPipeline>,
    /// Cancelled on shutdown. Digest runs take a child token so in-progress
    /// scoring stops dispatching new chunks.
    pub shutdown: CancellationToken,
}
