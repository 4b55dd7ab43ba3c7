//! Curation orchestrator. Scores every chunk in turn, merges the results and
//! produces the ranked, thresholded list for the digest.
//!
//! Chunks are scored strictly one after another: chunk N+1 is not sent until
//! chunk N (including its retries) has resolved.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::curation::chunker::chunk;
use crate::curation::scorer::{RelevanceScorer, ScoreMap};
use crate::models::article::{Article, ScoredArticle};

#[derive(Debug, Error)]
pub enum CurationError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Counts of scores per band, over every article that went into a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    pub band_0_30: usize,
    pub band_31_50: usize,
    pub band_51_70: usize,
    pub band_71_85: usize,
    pub band_86_100: usize,
}

impl ScoreDistribution {
    pub fn record(&mut self, score: u8) {
        match score {
            0..=30 => self.band_0_30 += 1,
            31..=50 => self.band_31_50 += 1,
            51..=70 => self.band_51_70 += 1,
            71..=85 => self.band_71_85 += 1,
            _ => self.band_86_100 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.band_0_30 + self.band_31_50 + self.band_51_70 + self.band_71_85 + self.band_86_100
    }
}

impl FromIterator<u8> for ScoreDistribution {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut distribution = ScoreDistribution::default();
        for score in iter {
            distribution.record(score);
        }
        distribution
    }
}

impl fmt::Display for ScoreDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0-30: {}, 31-50: {}, 51-70: {}, 71-85: {}, 86-100: {}",
            self.band_0_30, self.band_31_50, self.band_51_70, self.band_71_85, self.band_86_100
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkStats {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    /// Chunks never dispatched because the run was cancelled.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct CurationOutcome {
    /// Articles at or above the threshold, highest score first.
    pub articles: Vec<ScoredArticle>,
    pub distribution: ScoreDistribution,
    pub chunks: ChunkStats,
    pub cancelled: bool,
}

/// Scores `articles` against `interests` and returns those scoring at least
/// `threshold`, sorted by score descending.
///
/// Steps:
/// 1. Split into chunks of `chunk_size`
/// 2. Score each chunk sequentially; a failed chunk is logged and skipped
/// 3. Annotate every article with its score, 0 if it has none
/// 4. Filter to `>= threshold` and stable-sort descending, so ties keep input order
/// 5. Log the score distribution over all articles
///
/// Cancelling `cancel` stops new chunks from being dispatched; whatever was scored
/// up to that point is still used.
///
/// # Errors
///
/// Only a zero `chunk_size` with a non-empty input is rejected. Scoring failures
/// never surface here.
pub async fn curate(
    scorer: &dyn RelevanceScorer,
    interests: &str,
    articles: &[Article],
    chunk_size: usize,
    threshold: u8,
    cancel: &CancellationToken,
) -> Result<CurationOutcome, CurationError> {
    if chunk_size == 0 && !articles.is_empty() {
        return Err(CurationError::InvalidChunkSize);
    }

    let chunks = chunk(articles, chunk_size);
    let mut stats = ChunkStats {
        total: chunks.len(),
        ..ChunkStats::default()
    };
    let mut accumulator = ScoreMap::default();
    let mut cancelled = false;

    for (index, batch) in chunks.iter().enumerate() {
        if cancel.is_cancelled() {
            stats.skipped = chunks.len() - index;
            cancelled = true;
            warn!(
                "Curation cancelled before chunk {}/{}; {} chunks left unscored",
                index + 1,
                chunks.len(),
                stats.skipped
            );
            break;
        }

        info!(
            "Scoring chunk {}/{} ({} articles)",
            index + 1,
            chunks.len(),
            batch.len()
        );

        match scorer.score(batch, interests, cancel).await {
            Ok(scores) => {
                if scores.is_empty() {
                    warn!("Chunk {}/{} returned no usable scores", index + 1, chunks.len());
                } else {
                    info!(
                        "Chunk {}/{} returned {} scores",
                        index + 1,
                        chunks.len(),
                        scores.len()
                    );
                }
                accumulator.merge(scores);
                stats.scored += 1;
            }
            Err(e) => {
                error!(
                    "Chunk {}/{} failed, its {} articles stay unscored: {e}",
                    index + 1,
                    chunks.len(),
                    batch.len()
                );
                stats.failed += 1;
            }
        }
    }

    let annotated: Vec<ScoredArticle> = articles
        .iter()
        .map(|a| ScoredArticle::new(a.clone(), accumulator.get(&a.id).unwrap_or(0)))
        .collect();

    let distribution: ScoreDistribution = annotated.iter().map(|a| a.relevance_score).collect();

    let mut curated: Vec<ScoredArticle> = annotated
        .into_iter()
        .filter(|a| a.relevance_score >= threshold)
        .collect();
    curated.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

    info!(
        "Score distribution over {} articles: {distribution}",
        distribution.total()
    );
    info!(
        "Curated {} of {} articles at threshold {threshold} ({} of {} chunks failed)",
        curated.len(),
        articles.len(),
        stats.failed,
        stats.total
    );

    Ok(CurationOutcome {
        articles: curated,
        distribution,
        chunks: stats,
        cancelled,
    })
}
