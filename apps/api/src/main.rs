mod config;
mod conversation;
mod curation;
mod digest;
mod errors;
mod library;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::curation::pipeline::DigestPipeline;
use crate::curation::scorer::LlmRelevanceScorer;
use crate::digest::ResendSender;
use crate::library::cache::{LibraryCache, MemoryCache, RedisCache};
use crate::library::{CachedLibraryProvider, HttpLibraryProvider};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{create_pool, PgUserStore};

const LIBRARY_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const EMAIL_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Curator API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_timeout,
    )?);
    info!(
        "LLM client initialized (model: {}, timeout: {}s)",
        llm_client::MODEL,
        config.llm_timeout.as_secs()
    );

    // Library store behind Redis when configured, in-process cache otherwise
    let cache = build_library_cache(&config).await;
    let library = Arc::new(CachedLibraryProvider::new(
        Arc::new(HttpLibraryProvider::new(
            &config.library_base_url,
            LIBRARY_FETCH_TIMEOUT,
        )?),
        cache,
    ));

    let email = Arc::new(ResendSender::new(
        config.email_api_key.clone(),
        config.email_from.clone(),
        EMAIL_TIMEOUT,
    )?);

    let scorer = Arc::new(LlmRelevanceScorer::new(llm.clone(), config.curation.retry));
    info!(
        "Curation: chunk {} / threshold {} / cap {} / {} sections",
        config.curation.chunk_size,
        config.curation.threshold,
        config.curation.max_scoring_articles,
        config.curation.available_sections.len()
    );

    let pipeline = DigestPipeline::new(
        llm.clone(),
        scorer,
        library,
        email,
        Arc::new(PgUserStore::new(db)),
        config.curation.clone(),
    );

    // Build app state
    let shutdown = CancellationToken::new();
    let state = AppState {
        llm,
        pipeline: Arc::new(pipeline),
        shutdown: shutdown.clone(),
    };

    // Build router
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn build_library_cache(config: &Config) -> Arc<dyn LibraryCache> {
    if let Some(url) = &config.redis_url {
        match redis::Client::open(url.as_str()) {
            Ok(client) => match RedisCache::connect(&client, config.library_cache_ttl).await {
                Ok(cache) => {
                    info!("Library cache: Redis (ttl {}s)", config.library_cache_ttl.as_secs());
                    return Arc::new(cache);
                }
                Err(e) => warn!("Redis unavailable ({e}), using in-process library cache"),
            },
            Err(e) => warn!("Invalid REDIS_URL ({e}), using in-process library cache"),
        }
    }

    info!(
        "Library cache: in-process (ttl {}s, max {} sections)",
        config.library_cache_ttl.as_secs(),
        config.library_cache_max_entries
    );
    Arc::new(MemoryCache::new(
        config.library_cache_ttl,
        config.library_cache_max_entries,
    ))
}

/// Resolves on Ctrl-C and cancels `shutdown` so running digests stop
/// dispatching new scoring chunks.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
