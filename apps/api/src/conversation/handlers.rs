use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::conversation;
use crate::errors::AppError;
use crate::llm_client::ChatMessage;
use crate::state::AppState;

const MAX_HISTORY_MESSAGES: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Also condense the conversation into an interest description.
    #[serde(default)]
    pub finalize: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<String>,
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, AppError> {
    if body.messages.len() > MAX_HISTORY_MESSAGES {
        return Err(AppError::Validation(format!(
            "Conversation is limited to {MAX_HISTORY_MESSAGES} messages"
        )));
    }

    let llm = state.llm.as_ref();
    let (reply, interests) = if body.finalize {
        let (reply, interests) = tokio::join!(
            conversation::reply(llm, &body.messages),
            conversation::extract_interests(llm, &body.messages)
        );
        (reply, Some(interests))
    } else {
        (conversation::reply(llm, &body.messages).await, None)
    };

    Ok(Json(ChatResponse { reply, interests }))
}
