//! Axum route handlers for the Digest API.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::conversation::MAX_INTERESTS_CHARS;
use crate::curation::orchestrator::ScoreDistribution;
use crate::curation::pipeline::DigestRequest;
use crate::errors::AppError;
use crate::models::article::ScoredArticle;
use crate::state::AppState;

const MIN_INTERESTS_CHARS: usize = 10;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DigestBody {
    /// Omitted for a first-time reader; a new id is assigned.
    pub user_id: Option<Uuid>,
    pub email: String,
    pub interests: String,
}

#[derive(Debug, Serialize)]
pub struct DigestResponse {
    pub user_id: Uuid,
    pub selected_sections: String,
    pub candidate_count: usize,
    pub article_count: usize,
    pub email_sent: bool,
    pub used_fallback: bool,
    pub distribution: ScoreDistribution,
    pub articles: Vec<ScoredArticle>,
}

#[derive(Debug, Serialize)]
pub struct SectionsResponse {
    pub sections: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/sections
pub async fn handle_list_sections(State(state): State<AppState>) -> Json<SectionsResponse> {
    Json(SectionsResponse {
        sections: state.pipeline.available_sections().to_vec(),
    })
}

/// POST /api/v1/digest
pub async fn handle_create_digest(
    State(state): State<AppState>,
    Json(body): Json<DigestBody>,
) -> Result<Json<DigestResponse>, AppError> {
    if state.shutdown.is_cancelled() {
        return Err(AppError::ShuttingDown);
    }
    let (email, interests) = validate(&body)?;
    let user_id = body.user_id.unwrap_or_else(Uuid::new_v4);
    info!("Digest requested for user {user_id}");

    // Detached from the request future: a client disconnect must not stop the run.
    let cancel = state.shutdown.child_token();
    let pipeline = Arc::clone(&state.pipeline);
    let request = DigestRequest {
        user_id,
        email,
        interests,
    };
    let run = tokio::spawn(async move { pipeline.run(request, &cancel).await })
        .await
        .map_err(|e| anyhow::anyhow!("Digest run for user {user_id} panicked: {e}"))?;

    // Persistence finishes in the background; the response doesn't wait for it.
    drop(run.persist);

    Ok(Json(DigestResponse {
        user_id: run.user_id,
        selected_sections: run.curated.selected_sections,
        candidate_count: run.curated.candidate_count,
        article_count: run.curated.articles.len(),
        email_sent: run.email.success,
        used_fallback: run.curated.used_fallback,
        distribution: run.curated.distribution,
        articles: run.curated.articles,
    }))
}

fn validate(body: &DigestBody) -> Result<(String, String), AppError> {
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email address is required".to_string()));
    }

    let interests = body.interests.trim();
    let len = interests.chars().count();
    if !(MIN_INTERESTS_CHARS..=MAX_INTERESTS_CHARS).contains(&len) {
        return Err(AppError::Validation(format!(
            "Interests must be between {MIN_INTERESTS_CHARS} and {MAX_INTERESTS_CHARS} characters (got {len})"
        )));
    }

    Ok((email.to_string(), interests.to_string()))
}
