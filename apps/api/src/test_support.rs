//! Fakes shared by unit tests across modules.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::curation::scorer::{RelevanceScorer, ScoreError, ScoreMap};
use crate::digest::{DigestEmail, EmailOutcome, EmailSender};
use crate::library::LibraryProvider;
use crate::llm_client::{ChatRequest, LanguageModel, LlmError};
use crate::models::article::{Article, SectionLibrary};
use crate::models::user::UserRecord;
use crate::store::UserStore;

/// A language model that replays a fixed script of responses, one per call,
/// and records every request it receives. Once the script runs out it fails
/// with a server error.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(server_error()))
    }
}

pub fn timeout_error() -> LlmError {
    LlmError::Timeout(Duration::from_secs(30))
}

pub fn server_error() -> LlmError {
    LlmError::Api {
        status: 500,
        message: "internal error".to_string(),
    }
}

pub fn article(id: &str, section: &str, published: Option<&str>) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Title {id}"),
        url: format!("https://example.com/{id}"),
        trail_text: format!("Trail for {id}"),
        summary: None,
        section: section.to_string(),
        published_date: published.map(String::from),
    }
}

/// `count` articles in `section`, newest first, one minute apart.
pub fn articles(section: &str, count: usize) -> Vec<Article> {
    (0..count)
        .map(|i| {
            let minutes = 59 - (i % 60);
            let hours = 23 - ((i / 60) % 24);
            let date = format!("2024-03-01T{hours:02}:{minutes:02}:00Z");
            article(&format!("{section}/{i}"), section, Some(&date))
        })
        .collect()
}

/// Library provider over fixed in-memory pools. Unknown sections are `None`.
#[derive(Default)]
pub struct StaticLibrary {
    pools: HashMap<String, Arc<SectionLibrary>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticLibrary {
    pub fn with(mut self, section: &str, count: usize) -> Self {
        self.pools.insert(
            section.to_string(),
            Arc::new(SectionLibrary {
                section: Some(section.to_string()),
                last_updated: None,
                articles: articles(section, count),
            }),
        );
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl LibraryProvider for StaticLibrary {
    async fn fetch_library(&self, section: &str) -> Option<Arc<SectionLibrary>> {
        self.fetched.lock().unwrap().push(section.to_string());
        self.pools.get(section).cloned()
    }
}

/// Scores every article by section: listed sections get their score, the rest 0.
pub struct SectionScorer {
    scores: HashMap<String, u8>,
    calls: Mutex<usize>,
}

impl SectionScorer {
    pub fn new(scores: &[(&str, u8)]) -> Self {
        Self {
            scores: scores.iter().map(|(s, v)| (s.to_string(), *v)).collect(),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RelevanceScorer for SectionScorer {
    async fn score(
        &self,
        chunk: &[Article],
        _interests: &str,
        _cancel: &CancellationToken,
    ) -> Result<ScoreMap, ScoreError> {
        *self.calls.lock().unwrap() += 1;
        Ok(chunk
            .iter()
            .map(|a| (a.id.clone(), self.scores.get(&a.section).copied().unwrap_or(0)))
            .collect())
    }
}

/// Records every digest handed to it; `failing` reports every send as failed.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<DigestEmail>>,
    pub failing: bool,
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send_digest(&self, email: &DigestEmail) -> EmailOutcome {
        self.sent.lock().unwrap().push(email.clone());
        EmailOutcome {
            success: !self.failing,
            message_id: None,
            error: self.failing.then(|| "mailbox unavailable".to_string()),
        }
    }
}

/// Keeps saved records in memory; `failing` rejects every save.
#[derive(Default)]
pub struct MemoryUserStore {
    pub saved: Mutex<Vec<UserRecord>>,
    pub failing: bool,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn save(&self, record: &UserRecord) -> Result<(), sqlx::Error> {
        if self.failing {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}
