use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::curation::retry::RetryPolicy;

/// Sections offered to the selector when `AVAILABLE_SECTIONS` is not set.
const DEFAULT_SECTIONS: &[&str] = &[
    "news",
    "world",
    "uk-news",
    "us-news",
    "politics",
    "business",
    "money",
    "technology",
    "science",
    "environment",
    "global-development",
    "education",
    "society",
    "media",
    "sport",
    "football",
    "culture",
    "books",
    "film",
    "music",
    "stage",
    "artanddesign",
    "lifeandstyle",
    "food",
    "travel",
];

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Enables the shared Redis library cache; in-process cache otherwise.
    pub redis_url: Option<String>,
    pub anthropic_api_key: String,
    pub llm_timeout: Duration,
    pub library_base_url: String,
    pub library_cache_ttl: Duration,
    pub library_cache_max_entries: usize,
    pub email_api_key: String,
    pub email_from: String,
    pub port: u16,
    pub rust_log: String,
    pub curation: CurationConfig,
}

/// Tunables for one digest run.
#[derive(Debug, Clone, PartialEq)]
pub struct CurationConfig {
    pub available_sections: Vec<String>,
    /// Articles per scoring call.
    pub chunk_size: usize,
    /// Minimum score for an article to make the digest.
    pub threshold: u8,
    /// Cap on the sampled candidate pool sent for scoring.
    pub max_scoring_articles: usize,
    /// Cap on the articles in the final digest.
    pub max_digest_articles: usize,
    /// Unscored articles used when curation itself fails.
    pub fallback_article_count: usize,
    pub retry: RetryPolicy,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            available_sections: DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect(),
            chunk_size: 100,
            threshold: 70,
            max_scoring_articles: 1000,
            max_digest_articles: 25,
            fallback_article_count: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = CurationConfig::default();
        let curation = CurationConfig {
            available_sections: match std::env::var("AVAILABLE_SECTIONS") {
                Ok(list) => parse_section_list(&list),
                Err(_) => defaults.available_sections,
            },
            chunk_size: env_or("CURATION_CHUNK_SIZE", defaults.chunk_size)?,
            threshold: env_or("RELEVANCE_THRESHOLD", defaults.threshold)?,
            max_scoring_articles: env_or("MAX_SCORING_ARTICLES", defaults.max_scoring_articles)?,
            max_digest_articles: env_or("MAX_DIGEST_ARTICLES", defaults.max_digest_articles)?,
            fallback_article_count: env_or(
                "FALLBACK_ARTICLE_COUNT",
                defaults.fallback_article_count,
            )?,
            retry: RetryPolicy {
                max_attempts: env_or("SCORER_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                delay: Duration::from_secs(env_or(
                    "SCORER_RETRY_DELAY_SECS",
                    defaults.retry.delay.as_secs(),
                )?),
            },
        };

        anyhow::ensure!(curation.chunk_size > 0, "CURATION_CHUNK_SIZE must be greater than 0");
        anyhow::ensure!(curation.threshold <= 100, "RELEVANCE_THRESHOLD must be between 0 and 100");

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_timeout: Duration::from_secs(env_or("LLM_TIMEOUT_SECS", 30)?),
            library_base_url: require_env("LIBRARY_BASE_URL")?,
            library_cache_ttl: Duration::from_secs(env_or("LIBRARY_CACHE_TTL_SECS", 3600)?),
            library_cache_max_entries: env_or("LIBRARY_CACHE_MAX_ENTRIES", 64)?,
            email_api_key: require_env("EMAIL_API_KEY")?,
            email_from: require_env("EMAIL_FROM")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            curation,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Comma-separated section ids, trimmed and lower-cased; blanks dropped.
fn parse_section_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
