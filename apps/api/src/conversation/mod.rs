//! Interest interview: a short chat that ends with a free-text interest
//! description the curation pipeline can work from.

pub mod handlers;
pub mod prompts;

use tracing::warn;

use crate::conversation::prompts::{EXTRACT_PROMPT_TEMPLATE, EXTRACT_SYSTEM, INTERVIEW_SYSTEM};
use crate::llm_client::prompts::{fill_template, EDITOR_PERSONA};
use crate::llm_client::{ChatMessage, ChatRequest, LanguageModel, Role};

pub const OPENING_QUESTION: &str =
    "Hi! What kinds of news do you like to keep up with? Topics, teams, companies, places, anything goes.";

/// Used when the model can't produce the next turn.
pub const FALLBACK_REPLY: &str =
    "Thanks! Could you tell me a little more about the topics you'd like to see in your digest?";

/// Upper bound the digest endpoint accepts for an interest description.
pub const MAX_INTERESTS_CHARS: usize = 5000;

const INTERVIEW_TEMPERATURE: f32 = 0.7;
const EXTRACT_TEMPERATURE: f32 = 0.3;

/// The interviewer's next message. An empty or assistant-first history gets the
/// opening question without a model call.
pub async fn reply(llm: &dyn LanguageModel, history: &[ChatMessage]) -> String {
    let Some(start) = history.iter().position(|m| m.role == Role::User) else {
        return OPENING_QUESTION.to_string();
    };

    let request = ChatRequest {
        system: format!("{EDITOR_PERSONA} {INTERVIEW_SYSTEM}"),
        messages: history[start..].to_vec(),
        temperature: Some(INTERVIEW_TEMPERATURE),
    };

    match llm.complete(&request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Interview reply was empty, using fallback");
            FALLBACK_REPLY.to_string()
        }
        Err(e) => {
            warn!("Interview reply failed ({e}), using fallback");
            FALLBACK_REPLY.to_string()
        }
    }
}

/// Condenses the conversation into one interest description. Falls back to the
/// reader's own messages joined together when the model call fails.
pub async fn extract_interests(llm: &dyn LanguageModel, history: &[ChatMessage]) -> String {
    let fallback = user_messages(history);
    if fallback.is_empty() {
        return fallback;
    }

    let rendered = transcript(history);
    let prompt = fill_template(EXTRACT_PROMPT_TEMPLATE, &[("transcript", rendered.as_str())]);
    let request = ChatRequest::single_turn(format!("{EDITOR_PERSONA} {EXTRACT_SYSTEM}"), prompt)
        .with_temperature(EXTRACT_TEMPERATURE);

    let extracted = match llm.complete(&request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Interest extraction returned nothing, using the reader's own words");
            fallback
        }
        Err(e) => {
            warn!("Interest extraction failed ({e}), using the reader's own words");
            fallback
        }
    };

    clip_chars(extracted, MAX_INTERESTS_CHARS)
}

fn user_messages(history: &[ChatMessage]) -> String {
    history
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| match m.role {
            Role::User => format!("Reader: {}", m.content.trim()),
            Role::Assistant => format!("Interviewer: {}", m.content.trim()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}
