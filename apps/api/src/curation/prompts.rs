// All LLM prompt constants for the curation pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for section selection. Output is a bare pipe-delimited list.
pub const SECTION_SELECT_SYSTEM: &str = "You map a reader's interests onto news sections. \
    Respond with section ids ONLY, separated by the pipe character, for example: technology|science|world. \
    Use ONLY ids from the list you are given. \
    Do NOT add spaces, explanations, numbering or any other text.";

/// Section selection prompt. Replace `{interests}` and `{sections}` before sending.
pub const SECTION_SELECT_PROMPT_TEMPLATE: &str = r#"READER INTERESTS:
{interests}

AVAILABLE SECTION IDS:
{sections}

Pick every section whose articles this reader is likely to want. Prefer a focused
selection of 3 to 8 sections. Return the ids joined with "|"."#;

/// Scoring prompt. Replace `{interests}` and `{articles}` before sending.
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Score how relevant each article is to the reader.

READER INTERESTS:
{interests}

ARTICLES:
{articles}

Return ONE flat JSON object. Keys are the exact article ids shown after "ID:",
values are integers from 0 to 100:
{"world/2024/jan/15/example": 85, "technology/2024/jan/15/other": 20}

SCORING GUIDE:
- 86-100: squarely about something the reader named
- 71-85: clearly related, the reader would want it
- 51-70: tangentially related
- 31-50: weak connection
- 0-30: unrelated

Score EVERY article listed. Do not invent ids. Do not wrap the object in an array."#;
