//! Digest pipeline: everything between an interest description and a sent digest.
//!
//! Flow:
//! 1. Section selection (one model call, static fallback)
//! 2. Library fetch per selected section (cached; missing sections are empty)
//! 3. Proportional sampling down to `max_scoring_articles`
//! 4. Chunked relevance scoring and thresholding
//! 5. Compose and send the digest email
//! 6. Persist the user record in the background

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::CurationConfig;
use crate::curation::orchestrator::{curate, ScoreDistribution};
use crate::curation::sampler::sample;
use crate::curation::scorer::RelevanceScorer;
use crate::curation::sections::{parse_sections, select_sections};
use crate::digest::{compose_digest, EmailOutcome, EmailSender};
use crate::library::LibraryProvider;
use crate::llm_client::LanguageModel;
use crate::models::article::{Article, ScoredArticle};
use crate::models::user::UserRecord;
use crate::store::{PersistTask, UserStore};

/// Result of curation alone, before anything is sent.
#[derive(Debug, Clone)]
pub struct CuratedDigest {
    /// Pipe-delimited, as returned by the section selector.
    pub selected_sections: String,
    pub candidate_count: usize,
    pub articles: Vec<ScoredArticle>,
    pub distribution: ScoreDistribution,
    /// True when curation was rejected outright (invalid chunk size) and
    /// unscored articles were used.
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub user_id: Uuid,
    pub email: String,
    pub interests: String,
}

pub struct DigestRun {
    pub user_id: Uuid,
    pub curated: CuratedDigest,
    pub email: EmailOutcome,
    pub persist: PersistTask,
}

pub struct DigestPipeline {
    llm: Arc<dyn LanguageModel>,
    scorer: Arc<dyn RelevanceScorer>,
    library: Arc<dyn LibraryProvider>,
    email: Arc<dyn EmailSender>,
    users: Arc<dyn UserStore>,
    config: CurationConfig,
}

impl DigestPipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        scorer: Arc<dyn RelevanceScorer>,
        library: Arc<dyn LibraryProvider>,
        email: Arc<dyn EmailSender>,
        users: Arc<dyn UserStore>,
        config: CurationConfig,
    ) -> Self {
        Self {
            llm,
            scorer,
            library,
            email,
            users,
            config,
        }
    }

    pub fn available_sections(&self) -> &[String] {
        &self.config.available_sections
    }

    /// Selects, fetches, samples and scores. Never fails: a curation error
    /// degrades to the first `fallback_article_count` sampled articles, unscored.
    ///
    /// Individual chunk failures are absorbed by the orchestrator, so the only
    /// curation error is an invalid chunk size. `Config::from_env` already
    /// rejects that; the fallback guards pipelines built from a hand-made
    /// `CurationConfig`, and `used_fallback` is false for every run configured
    /// from the environment.
    pub async fn curate_for(&self, interests: &str, cancel: &CancellationToken) -> CuratedDigest {
        let selected_sections =
            select_sections(self.llm.as_ref(), interests, &self.config.available_sections).await;
        let sections = parse_sections(&selected_sections);

        let pools = self.fetch_pools(&sections).await;
        let candidates = sample(&pools, &sections, self.config.max_scoring_articles);
        info!(
            "{} candidate articles from {} sections",
            candidates.len(),
            sections.len()
        );

        let (mut articles, distribution, used_fallback) = match curate(
            self.scorer.as_ref(),
            interests,
            &candidates,
            self.config.chunk_size,
            self.config.threshold,
            cancel,
        )
        .await
        {
            Ok(outcome) => {
                if outcome.cancelled {
                    warn!(
                        "Curation cancelled with {} of {} chunks unscored",
                        outcome.chunks.skipped, outcome.chunks.total
                    );
                }
                (outcome.articles, outcome.distribution, false)
            }
            Err(e) => {
                error!(
                    "Curation failed ({e}), falling back to the first {} candidates",
                    self.config.fallback_article_count
                );
                (
                    fallback_articles(&candidates, self.config.fallback_article_count),
                    ScoreDistribution::default(),
                    true,
                )
            }
        };

        articles.truncate(self.config.max_digest_articles);

        CuratedDigest {
            selected_sections,
            candidate_count: candidates.len(),
            articles,
            distribution,
            used_fallback,
        }
    }

    /// Curates, sends the digest and starts persisting the user record.
    /// A failed send is logged and reported in the result.
    pub async fn run(&self, request: DigestRequest, cancel: &CancellationToken) -> DigestRun {
        let curated = self.curate_for(&request.interests, cancel).await;

        let sections = parse_sections(&curated.selected_sections);
        let digest = compose_digest(
            &request.email,
            &sections,
            &curated.articles,
            Utc::now().date_naive(),
        );
        let email = self.email.send_digest(&digest).await;
        if !email.success {
            warn!(
                "Digest for user {} was not delivered: {}",
                request.user_id,
                email.error.as_deref().unwrap_or("unknown error")
            );
        }

        let now = Utc::now();
        let record = UserRecord {
            user_id: request.user_id,
            email: request.email,
            user_interests: request.interests,
            selected_sections: curated.selected_sections.clone(),
            curated_articles: serde_json::to_value(&curated.articles)
                .unwrap_or_else(|_| Value::Array(Vec::new())),
            article_count: i32::try_from(curated.articles.len()).unwrap_or(i32::MAX),
            created_at: now,
            updated_at: now,
        };
        let persist = PersistTask::spawn(Arc::clone(&self.users), record);

        DigestRun {
            user_id: request.user_id,
            curated,
            email,
            persist,
        }
    }

    async fn fetch_pools(&self, sections: &[String]) -> HashMap<String, Vec<Article>> {
        let mut pools = HashMap::with_capacity(sections.len());
        for section in sections {
            if pools.contains_key(section) {
                continue;
            }
            match self.library.fetch_library(section).await {
                Some(library) => {
                    pools.insert(section.clone(), library.articles.clone());
                }
                None => warn!("No library for section '{section}', treating it as empty"),
            }
        }
        pools
    }
}

fn fallback_articles(candidates: &[Article], count: usize) -> Vec<ScoredArticle> {
    candidates
        .iter()
        .take(count)
        .cloned()
        .map(ScoredArticle::unscored)
        .collect()
}
