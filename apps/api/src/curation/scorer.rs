//! Relevance scoring: one language-model call per chunk, parsed into a score map.
//!
//! `LlmRelevanceScorer` is the production backend. The orchestrator depends on
//! the `RelevanceScorer` trait so scoring can be faked in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::curation::prompts::SCORING_PROMPT_TEMPLATE;
use crate::curation::retry::{retry_on_timeout, RetryPolicy};
use crate::llm_client::prompts::{fill_template, EDITOR_PERSONA, JSON_ONLY_SYSTEM};
use crate::llm_client::{ChatRequest, LanguageModel, LlmError};
use crate::models::article::Article;

const SCORING_TEMPERATURE: f32 = 0.2;
/// Trail and summary text is clipped to keep a 100-article prompt bounded.
const MAX_BLURB_CHARS: usize = 280;

// ────────────────────────────────────────────────────────────────────────────
// Score map
// ────────────────────────────────────────────────────────────────────────────

/// Article id → relevance score (0–100).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreMap(HashMap<String, u8>);

impl ScoreMap {
    pub fn get(&self, id: &str) -> Option<u8> {
        self.0.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, id: impl Into<String>, score: u8) {
        self.0.insert(id.into(), score.min(100));
    }

    /// Union of two maps. Ids are globally unique across chunks so collisions
    /// only happen on re-scoring; the newer score wins.
    pub fn merge(&mut self, other: ScoreMap) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(String, u8)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (String, u8)>>(iter: I) -> Self {
        let mut map = ScoreMap::default();
        for (id, score) in iter {
            map.insert(id, score);
        }
        map
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("scoring call failed after {attempts} attempt(s): {source}")]
    Llm {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("model output contained no parseable score object: {0}")]
    Unparseable(String),
}

/// Scores one chunk of articles against an interest description.
///
/// Returned maps only ever contain ids from `chunk`.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(
        &self,
        chunk: &[Article],
        interests: &str,
        cancel: &CancellationToken,
    ) -> Result<ScoreMap, ScoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmRelevanceScorer
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmRelevanceScorer {
    llm: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl LlmRelevanceScorer {
    pub fn new(llm: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    async fn score(
        &self,
        chunk: &[Article],
        interests: &str,
        cancel: &CancellationToken,
    ) -> Result<ScoreMap, ScoreError> {
        if chunk.is_empty() {
            return Ok(ScoreMap::default());
        }

        let request = ChatRequest::single_turn(
            format!("{EDITOR_PERSONA} {JSON_ONLY_SYSTEM}"),
            build_scoring_prompt(chunk, interests),
        )
        .with_temperature(SCORING_TEMPERATURE);

        let text = retry_on_timeout(self.retry, cancel, "Relevance scoring", || {
            self.llm.complete(&request)
        })
        .await
        .map_err(|e| ScoreError::Llm {
            attempts: e.attempts,
            source: e.last_error,
        })?;

        let chunk_ids: HashSet<&str> = chunk.iter().map(|a| a.id.as_str()).collect();
        let scores = parse_score_map(&text, &chunk_ids).ok_or_else(|| {
            ScoreError::Unparseable(text.chars().take(120).collect::<String>())
        })?;

        if scores.len() < chunk.len() {
            debug!(
                "Scorer returned {} of {} ids for this chunk",
                scores.len(),
                chunk.len()
            );
        }
        Ok(scores)
    }
}

/// Renders the chunk as compact text blocks and fills the scoring template.
fn build_scoring_prompt(chunk: &[Article], interests: &str) -> String {
    let articles = chunk
        .iter()
        .map(|a| {
            let mut block = format!(
                "ID: {}\nTitle: {}\nTrail: {}",
                a.id,
                a.title,
                clip(&a.trail_text)
            );
            if let Some(summary) = a.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                block.push_str(&format!("\nSummary: {}", clip(summary)));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    fill_template(
        SCORING_PROMPT_TEMPLATE,
        &[("interests", interests), ("articles", articles.as_str())],
    )
}

fn clip(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_BLURB_CHARS {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(MAX_BLURB_CHARS).collect();
        clipped.push('…');
        clipped
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response parsing
// ────────────────────────────────────────────────────────────────────────────

/// Pulls the outermost `{...}` out of `text` and reads it as a flat id → score
/// object. Ids not in `chunk_ids` and non-numeric values are dropped; scores are
/// rounded and clamped to 0–100. `None` when no object can be parsed.
pub fn parse_score_map(text: &str, chunk_ids: &HashSet<&str>) -> Option<ScoreMap> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    let object: serde_json::Map<String, Value> = serde_json::from_str(&text[start..=end]).ok()?;

    let mut scores = ScoreMap::default();
    for (id, value) in object {
        if !chunk_ids.contains(id.as_str()) {
            warn!("Discarding score for unknown article id '{id}'");
            continue;
        }
        if let Some(score) = numeric_score(&value) {
            scores.insert(id, score);
        }
    }
    Some(scores)
}

fn numeric_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::llm_client::LlmErrorKind;
    use crate::test_support::{article, articles, server_error, timeout_error, ScriptedModel};

    fn ids<'a>(list: &[&'a str]) -> HashSet<&'a str> {
        list.iter().copied().collect()
    }

    fn chunk() -> Vec<Article> {
        vec![
            article("tech/1", "technology", Some("2024-03-01T10:00:00Z")),
            article("tech/2", "technology", Some("2024-03-01T09:00:00Z")),
        ]
    }

    fn scorer(llm: Arc<ScriptedModel>) -> LlmRelevanceScorer {
        LlmRelevanceScorer::new(llm, RetryPolicy::default())
    }

    #[test]
    fn test_parse_plain_object() {
        let map = parse_score_map(r#"{"a": 90, "b": 10}"#, &ids(&["a", "b"])).unwrap();
        assert_eq!(map.get("a"), Some(90));
        assert_eq!(map.get("b"), Some(10));
    }

    #[test]
    fn test_parse_object_inside_prose_and_fences() {
        let text = "Here are the scores:\n```json\n{\"a\": 75}\n```\nHope that helps!";
        let map = parse_score_map(text, &ids(&["a"])).unwrap();
        assert_eq!(map.get("a"), Some(75));
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let map = parse_score_map(r#"{"a": 80, "invented": 99}"#, &ids(&["a"])).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("invented"), None);
    }

    #[test]
    fn test_scores_are_clamped_and_rounded() {
        let map = parse_score_map(
            r#"{"a": 140, "b": -5, "c": 72.6, "d": "64"}"#,
            &ids(&["a", "b", "c", "d"]),
        )
        .unwrap();
        assert_eq!(map.get("a"), Some(100));
        assert_eq!(map.get("b"), Some(0));
        assert_eq!(map.get("c"), Some(73));
        assert_eq!(map.get("d"), Some(64));
    }

    #[test]
    fn test_non_numeric_values_are_skipped() {
        let map = parse_score_map(r#"{"a": "high", "b": null, "c": 50}"#, &ids(&["a", "b", "c"]))
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("c"), Some(50));
    }

    #[test]
    fn test_non_json_returns_none() {
        assert!(parse_score_map("I cannot score these articles.", &ids(&["a"])).is_none());
        assert!(parse_score_map("} backwards {", &ids(&["a"])).is_none());
        assert!(parse_score_map("{not: json}", &ids(&["a"])).is_none());
    }

    #[test]
    fn test_wrapping_array_is_rejected() {
        assert!(parse_score_map(r#"[{"a": 1}, {"b": 2}]"#, &ids(&["a", "b"])).is_none());
    }

    #[test]
    fn test_merge_empty_map_changes_nothing() {
        let mut acc: ScoreMap = vec![("a".to_string(), 10u8)].into_iter().collect();
        let before = acc.clone();
        acc.merge(ScoreMap::default());
        assert_eq!(acc, before);
    }

    #[test]
    fn test_merge_is_union() {
        let mut acc: ScoreMap = vec![("a".to_string(), 10u8)].into_iter().collect();
        acc.merge(vec![("b".to_string(), 20u8)].into_iter().collect());
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get("b"), Some(20));
    }

    #[test]
    fn test_prompt_contains_ids_titles_and_interests() {
        let mut articles = chunk();
        articles[1].summary = Some("A longer summary".to_string());
        let prompt = build_scoring_prompt(&articles, "semiconductors");
        assert!(prompt.contains("semiconductors"));
        assert!(prompt.contains("ID: tech/1"));
        assert!(prompt.contains("Title: Title tech/2"));
        assert!(prompt.contains("Summary: A longer summary"));
    }

    #[test]
    fn test_placeholder_in_interests_is_not_expanded() {
        let batch = articles("tech", 100);
        let plain = build_scoring_prompt(&batch, "semiconductors");
        let interests = "{articles}".repeat(50);
        let prompt = build_scoring_prompt(&batch, &interests);

        assert!(prompt.contains(&interests));
        assert_eq!(prompt.matches("ID: tech/0\n").count(), 1);
        assert!(prompt.len() < plain.len() + interests.len());
    }

    #[test]
    fn test_long_trail_text_is_clipped() {
        let long = "x".repeat(1000);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_BLURB_CHARS + 1);
    }

    #[tokio::test]
    async fn test_score_returns_parsed_map() {
        let llm = Arc::new(ScriptedModel::replying(r#"{"tech/1": 88, "tech/2": 12}"#));
        let scores = scorer(llm.clone())
            .score(&chunk(), "chips", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(scores.get("tech/1"), Some(88));
        assert_eq!(scores.get("tech/2"), Some(12));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chunk_makes_no_call() {
        let llm = Arc::new(ScriptedModel::default());
        let scores = scorer(llm.clone())
            .score(&[], "chips", &CancellationToken::new())
            .await
            .unwrap();
        assert!(scores.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried_with_fixed_delay() {
        let llm = Arc::new(ScriptedModel::new(vec![
            Err(timeout_error()),
            Err(timeout_error()),
            Ok(r#"{"tech/1": 70}"#.to_string()),
        ]));
        let start = tokio::time::Instant::now();
        let scores = scorer(llm.clone())
            .score(&chunk(), "chips", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(scores.get("tech/1"), Some(70));
        assert_eq!(llm.calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_timeout_error_fails_without_retry() {
        let llm = Arc::new(ScriptedModel::new(vec![
            Err(server_error()),
            Ok(r#"{"tech/1": 70}"#.to_string()),
        ]));
        let err = scorer(llm.clone())
            .score(&chunk(), "chips", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ScoreError::Llm { attempts, source } => {
                assert_eq!(attempts, 1);
                assert_eq!(source.kind(), LlmErrorKind::Other);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_json_reply_is_unparseable() {
        let llm = Arc::new(ScriptedModel::replying("Sorry, I can't help with that."));
        let err = scorer(llm)
            .score(&chunk(), "chips", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::Unparseable(_)));
    }
}
