//! Section libraries: one pre-built JSON document of articles per section,
//! published to a static file store and fetched on demand.

pub mod cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::library::cache::LibraryCache;
use crate::models::article::SectionLibrary;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("invalid section id '{0}'")]
    InvalidSection(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("library '{section}' returned status {status}")]
    Status { section: String, status: StatusCode },

    #[error("library '{section}' is not valid JSON: {source}")]
    Decode {
        section: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of section libraries. `None` means the section could not be loaded;
/// callers treat it as an empty pool.
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    async fn fetch_library(&self, section: &str) -> Option<Arc<SectionLibrary>>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP provider
// ────────────────────────────────────────────────────────────────────────────

/// Fetches `{base_url}/{section}.json` from the library store.
#[derive(Clone)]
pub struct HttpLibraryProvider {
    client: Client,
    base_url: String,
}

impl HttpLibraryProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LibraryError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("curator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches and decodes one library. Articles missing a section are stamped
    /// with the requested one.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::InvalidSection`] if `section` is not a plain id.
    /// - [`LibraryError::Http`] on network failure.
    /// - [`LibraryError::Status`] on a non-2xx response.
    /// - [`LibraryError::Decode`] if the body is not a library document.
    pub async fn fetch(&self, section: &str) -> Result<SectionLibrary, LibraryError> {
        if !is_plain_id(section) {
            return Err(LibraryError::InvalidSection(section.to_string()));
        }

        let url = format!("{}/{section}.json", self.base_url);
        debug!("Fetching library {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LibraryError::Status {
                section: section.to_string(),
                status,
            });
        }

        let body = response.text().await?;
        let mut library: SectionLibrary =
            serde_json::from_str(&body).map_err(|source| LibraryError::Decode {
                section: section.to_string(),
                source,
            })?;

        for article in library.articles.iter_mut().filter(|a| a.section.is_empty()) {
            article.section = section.to_string();
        }

        Ok(library)
    }
}

#[async_trait]
impl LibraryProvider for HttpLibraryProvider {
    async fn fetch_library(&self, section: &str) -> Option<Arc<SectionLibrary>> {
        match self.fetch(section).await {
            Ok(library) => {
                info!(
                    "Loaded library '{section}' ({} articles)",
                    library.articles.len()
                );
                Some(Arc::new(library))
            }
            Err(e) => {
                warn!("Could not load library '{section}': {e}");
                None
            }
        }
    }
}

fn is_plain_id(section: &str) -> bool {
    !section.is_empty()
        && section
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ────────────────────────────────────────────────────────────────────────────
// Cached provider
// ────────────────────────────────────────────────────────────────────────────

/// Read-through cache in front of any provider. Failed fetches are not cached.
pub struct CachedLibraryProvider {
    inner: Arc<dyn LibraryProvider>,
    cache: Arc<dyn LibraryCache>,
}

impl CachedLibraryProvider {
    pub fn new(inner: Arc<dyn LibraryProvider>, cache: Arc<dyn LibraryCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl LibraryProvider for CachedLibraryProvider {
    async fn fetch_library(&self, section: &str) -> Option<Arc<SectionLibrary>> {
        if let Some(hit) = self.cache.get(section).await {
            debug!("Library cache hit for '{section}'");
            return Some(hit);
        }

        let library = self.inner.fetch_library(section).await?;
        self.cache.put(section, Arc::clone(&library)).await;
        Some(library)
    }
}
