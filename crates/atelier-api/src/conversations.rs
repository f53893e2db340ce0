use axum::{
    Extension,
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use atelier_db::Database;
use atelier_db::models::{ConversationRow, ParticipantPair, parse_timestamp};
use atelier_types::api::{Claims, ConversationResponse};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, ok};
use crate::messages::message_response;
use crate::permissions::{self, BlockState, Denial};
use crate::users::{recipient_policy, require_user, user_summary};

/// Every conversation containing the caller, annotated with the other
/// participant's profile, the last message, and the caller's unread
/// counter. Most recent activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let me = claims.sub.to_string();

    // Run the listing and its annotation off the async runtime
    let db = state.clone();
    let conversations = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_conversations_for_user(&me)?;
        rows.iter()
            .map(|row| conversation_response(&db.db, row, &me))
            .collect::<ApiResult<Vec<_>>>()
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(ok(conversations))
}

/// Get-or-create against another user. An existing conversation is always
/// returned; a new one must pass the first-contact permission gate.
pub async fn get_or_create(
    State(state): State<AppState>,
    Path(other_user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    if other_user_id == claims.sub {
        return Err(ApiError::permission(Denial::SelfContact.message()));
    }

    let other = require_user(&state.db, &other_user_id.to_string())?;
    let me = claims.sub.to_string();

    // Blocks end it here, whether or not a conversation exists.
    let (i_block, they_block) = state.db.blocked_between(&me, &other.id)?;
    let blocks = BlockState {
        sender_blocks_recipient: i_block,
        recipient_blocks_sender: they_block,
    };
    if blocks.any() {
        return Err(ApiError::permission(Denial::Blocked.message()));
    }

    let pair = ParticipantPair::new(&me, &other.id);
    if let Some(existing) = state.db.find_conversation_for_pair(&pair)? {
        return Ok(ok(conversation_response(&state.db, &existing, &me)?));
    }

    let related = state.db.follows_either(&me, &other.id)?;
    permissions::check_first_contact(false, recipient_policy(&other), blocks, related)
        .map_err(|denial| ApiError::permission(denial.message()))?;

    // The pair's unique index resolves concurrent first contacts: the
    // loser reads back the winner's row here instead of erroring.
    let conversation = state
        .db
        .create_or_fetch_conversation(&Uuid::new_v4().to_string(), &pair)?;

    Ok(ok(conversation_response(&state.db, &conversation, &me)?))
}

/// Participants only. Removes the conversation and every message in it.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let conversation = state
        .db
        .get_conversation(&conversation_id.to_string())?
        .ok_or_else(|| ApiError::not_found("conversation not found"))?;

    let me = claims.sub.to_string();
    if !conversation.is_participant(&me) {
        return Err(ApiError::permission(
            "only a participant can delete a conversation",
        ));
    }

    state.db.delete_conversation(&conversation.id)?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub(crate) fn conversation_response(
    db: &Database,
    row: &ConversationRow,
    me: &str,
) -> ApiResult<ConversationResponse> {
    let other = require_user(db, row.other_participant(me))?;

    let last_message = match &row.last_message_id {
        Some(message_id) => match db.get_message(message_id)? {
            Some(message) => {
                let reads = db.get_reads_for_messages(std::slice::from_ref(message_id))?;
                Some(message_response(&message, &reads)?)
            }
            None => None,
        },
        None => None,
    };

    Ok(ConversationResponse {
        id: row
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt conversation id '{}': {}", row.id, e))?,
        participant: user_summary(&other)?,
        last_message,
        last_message_at: row.last_message_at.as_deref().map(parse_timestamp),
        unread_count: row.unread_for(me),
        created_at: parse_timestamp(&row.created_at),
    })
}
