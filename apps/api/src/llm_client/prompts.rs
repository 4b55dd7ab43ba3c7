// Cross-cutting prompt fragments.
// Each feature that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Shared persona for every call that reasons about a reader's interests.
pub const EDITOR_PERSONA: &str = "You are the editor of a personalised daily news digest. \
    You know the reader only through what they have told you about their interests.";

/// Fills `{name}` placeholders in a single left-to-right pass. Substituted
/// values are never rescanned, so a value that itself contains a placeholder
/// is inserted literally. Unmatched braces are kept as-is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = values.iter().find_map(|(name, value)| {
            let body = tail.strip_prefix('{')?.strip_prefix(name)?;
            body.strip_prefix('}').map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
