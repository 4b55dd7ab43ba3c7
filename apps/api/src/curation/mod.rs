//! Article curation: section selection, sampling, chunked relevance scoring
//! and the digest pipeline that ties them together.

pub mod chunker;
pub mod handlers;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod sampler;
pub mod scorer;
pub mod sections;
