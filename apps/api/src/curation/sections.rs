//! Section selector. Maps a reader's interests onto a subset of available sections.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::curation::prompts::{SECTION_SELECT_PROMPT_TEMPLATE, SECTION_SELECT_SYSTEM};
use crate::llm_client::prompts::{fill_template, EDITOR_PERSONA};
use crate::llm_client::{ChatRequest, LanguageModel};

/// Returned whenever the model call fails or yields nothing usable.
pub const FALLBACK_SECTIONS: &str = "news|world";

const SECTION_SELECT_TEMPERATURE: f32 = 0.2;

/// Asks the model which of `available` match `interests` and returns them
/// pipe-delimited. Never fails: any error degrades to [`FALLBACK_SECTIONS`].
///
/// The model's answer is checked against `available` (case-insensitive) and
/// unknown ids are dropped. If nothing valid remains the fallback is returned.
pub async fn select_sections(
    llm: &dyn LanguageModel,
    interests: &str,
    available: &[String],
) -> String {
    if available.is_empty() {
        warn!("No sections available to select from, using fallback");
        return FALLBACK_SECTIONS.to_string();
    }

    let sections = available.join(", ");
    let prompt = fill_template(
        SECTION_SELECT_PROMPT_TEMPLATE,
        &[("interests", interests), ("sections", sections.as_str())],
    );
    let request = ChatRequest::single_turn(
        format!("{EDITOR_PERSONA} {SECTION_SELECT_SYSTEM}"),
        prompt,
    )
    .with_temperature(SECTION_SELECT_TEMPERATURE);

    let raw = match llm.complete(&request).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Section selection failed ({e}), using fallback '{FALLBACK_SECTIONS}'");
            return FALLBACK_SECTIONS.to_string();
        }
    };

    let selected = retain_known(&raw, available);
    if selected.is_empty() {
        warn!(
            "Section selection returned no known sections ({:?}), using fallback",
            raw.chars().take(120).collect::<String>()
        );
        return FALLBACK_SECTIONS.to_string();
    }

    let joined = selected.join("|");
    info!("Selected sections: {joined}");
    joined
}

/// Splits a pipe-delimited selection into trimmed, non-empty ids.
pub fn parse_sections(selection: &str) -> Vec<String> {
    selection
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Keeps the ids from `raw` that name an available section, in the model's
/// order, without duplicates, spelled as in `available`.
fn retain_known(raw: &str, available: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.trim()
        .split('|')
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '.')))
        .filter_map(|candidate| {
            available
                .iter()
                .find(|known| known.eq_ignore_ascii_case(candidate))
        })
        .filter(|known| seen.insert(known.as_str()))
        .cloned()
        .collect()
}
