//! Digest email: turns the curated list into an email and hands it to the sender.
//!
//! Only a plain-text body is produced here; the email provider is free to wrap
//! it in its own template.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::article::ScoredArticle;

const RESEND_API_URL: &str = "https://api.resend.com";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestEmail {
    pub recipient: String,
    pub subject: String,
    /// Human-readable list of the sections the digest was drawn from.
    pub sections_label: String,
    pub articles: Vec<ScoredArticle>,
    pub text_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl EmailOutcome {
    fn sent(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email API returned status {status}: {message}")]
    Api { status: u16, message: String },
}

/// Delivers a composed digest. Delivery problems are reported in the outcome,
/// never as an error, so a failed send cannot fail the request that caused it.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_digest(&self, email: &DigestEmail) -> EmailOutcome;
}

// ────────────────────────────────────────────────────────────────────────────
// Composition
// ────────────────────────────────────────────────────────────────────────────

/// Builds the digest for `recipient` from the ranked `articles`.
pub fn compose_digest(
    recipient: &str,
    sections: &[String],
    articles: &[ScoredArticle],
    date: NaiveDate,
) -> DigestEmail {
    let sections_label = sections_label(sections);
    let subject = format!(
        "Your news digest for {}: {} {}",
        date.format("%A %-d %B"),
        articles.len(),
        if articles.len() == 1 { "story" } else { "stories" }
    );

    DigestEmail {
        recipient: recipient.to_string(),
        subject,
        text_body: text_body(&sections_label, articles),
        sections_label,
        articles: articles.to_vec(),
    }
}

/// `"technology|uk-news"` style ids → `"Technology, UK News"`.
pub fn sections_label(sections: &[String]) -> String {
    sections
        .iter()
        .map(|s| {
            s.split(['-', '_'])
                .filter(|w| !w.is_empty())
                .map(title_case)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn title_case(word: &str) -> String {
    if word.chars().count() <= 2 {
        return word.to_uppercase();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn text_body(sections_label: &str, articles: &[ScoredArticle]) -> String {
    let mut body = String::new();
    if articles.is_empty() {
        body.push_str("We couldn't find stories matching your interests today. ");
        body.push_str("Tell us a bit more about what you follow and we'll try again tomorrow.\n");
        return body;
    }

    let _ = writeln!(body, "Today's picks from {sections_label}\n");
    for (i, scored) in articles.iter().enumerate() {
        let a = &scored.article;
        let _ = writeln!(body, "{}. {}", i + 1, a.title);
        if !a.trail_text.is_empty() {
            let _ = writeln!(body, "   {}", a.trail_text);
        }
        let _ = writeln!(body, "   {}\n", a.url);
    }
    body
}

// ────────────────────────────────────────────────────────────────────────────
// Resend sender
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Sends digests through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendSender {
    client: Client,
    api_key: String,
    from: String,
    base_url: String,
}

impl ResendSender {
    pub fn new(api_key: String, from: String, timeout: Duration) -> Result<Self, EmailError> {
        Self::with_base_url(api_key, from, timeout, RESEND_API_URL)
    }

    pub fn with_base_url(
        api_key: String,
        from: String,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, EmailError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            from,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, email: &DigestEmail) -> Result<Option<String>, EmailError> {
        let request = SendRequest {
            from: &self.from,
            to: [email.recipient.as_str()],
            subject: &email.subject,
            text: &email.text_body,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: SendResponse = response.json().await?;
        Ok(body.id)
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    async fn send_digest(&self, email: &DigestEmail) -> EmailOutcome {
        match self.send(email).await {
            Ok(id) => {
                info!(
                    "Digest sent to {} ({} articles, id {:?})",
                    email.recipient,
                    email.articles.len(),
                    id
                );
                EmailOutcome::sent(id)
            }
            Err(e) => {
                warn!("Digest email to {} failed: {e}", email.recipient);
                EmailOutcome::failed(e.to_string())
            }
        }
    }
}
