//! Section library cache. A fetched pool is reused across digest runs until its
//! TTL expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::article::SectionLibrary;

const REDIS_KEY_PREFIX: &str = "curator:library:";

#[async_trait]
pub trait LibraryCache: Send + Sync {
    async fn get(&self, section: &str) -> Option<Arc<SectionLibrary>>;
    async fn put(&self, section: &str, library: Arc<SectionLibrary>);
}

// ────────────────────────────────────────────────────────────────────────────
// In-process cache
// ────────────────────────────────────────────────────────────────────────────

struct Entry {
    stored_at: Instant,
    library: Arc<SectionLibrary>,
}

/// In-process cache with a TTL and a bound on the number of sections held.
/// When full, the entry stored longest ago is evicted.
pub struct MemoryCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl LibraryCache for MemoryCache {
    async fn get(&self, section: &str) -> Option<Arc<SectionLibrary>> {
        {
            let entries = self.entries.read().await;
            match entries.get(section) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(Arc::clone(&entry.library));
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it so it stops counting toward max_entries.
        let mut entries = self.entries.write().await;
        if entries
            .get(section)
            .is_some_and(|e| e.stored_at.elapsed() >= self.ttl)
        {
            entries.remove(section);
            debug!("Library cache entry for '{section}' expired");
        }
        None
    }

    async fn put(&self, section: &str, library: Arc<SectionLibrary>) {
        if self.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);

        if !entries.contains_key(section) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                debug!("Library cache full, evicting '{key}'");
                entries.remove(&key);
            }
        }

        entries.insert(
            section.to_string(),
            Entry {
                stored_at: Instant::now(),
                library,
            },
        );
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis cache
// ────────────────────────────────────────────────────────────────────────────

/// Shared cache for multiple API instances. Values are the library JSON with a
/// Redis-side expiry; any Redis or decode error is logged and treated as a miss.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    ttl: Duration,
}

impl RedisCache {
    pub async fn connect(client: &redis::Client, ttl: Duration) -> redis::RedisResult<Self> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, ttl })
    }

    fn key(section: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{section}")
    }
}

#[async_trait]
impl LibraryCache for RedisCache {
    async fn get(&self, section: &str) -> Option<Arc<SectionLibrary>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match redis::cmd("GET")
            .arg(Self::key(section))
            .query_async::<_, Option<String>>(&mut conn)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Redis GET for library '{section}' failed: {e}");
                return None;
            }
        };

        match serde_json::from_str::<SectionLibrary>(&raw?) {
            Ok(library) => Some(Arc::new(library)),
            Err(e) => {
                warn!("Cached library '{section}' is not valid JSON, ignoring: {e}");
                None
            }
        }
    }

    async fn put(&self, section: &str, library: Arc<SectionLibrary>) {
        let json = match serde_json::to_string(library.as_ref()) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize library '{section}' for caching: {e}");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let result = redis::cmd("SET")
            .arg(Self::key(section))
            .arg(json)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await;

        if let Err(e) = result {
            warn!("Redis SET for library '{section}' failed: {e}");
        }
    }
}
