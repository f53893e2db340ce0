use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use uuid::Uuid;

use atelier_db::Database;
use atelier_db::models::{ConversationRow, MessageReadRow, MessageRow, parse_timestamp};
use atelier_types::api::{Claims, MessageResponse, PageQuery, Pagination, SendMessageRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, created, ok, paginated};
use crate::permissions::{self, BlockState};
use crate::users::{recipient_policy, require_user};

pub(crate) const MESSAGE_MAX_LEN: usize = 2000;

/// The send gate runs on every message: block edges and the recipient's
/// kill-switch may have changed since the conversation was created.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Response> {
    if req.content.trim().is_empty() {
        return Err(ApiError::validation("message content is required"));
    }
    if req.content.len() > MESSAGE_MAX_LEN {
        return Err(ApiError::validation("message content is too long"));
    }

    let me = claims.sub.to_string();
    let conversation = require_conversation(&state.db, &conversation_id)?;
    require_participant(&conversation, &me)?;

    let other = require_user(&state.db, conversation.other_participant(&me))?;

    let (i_block, they_block) = state.db.blocked_between(&me, &other.id)?;
    permissions::check_send(
        recipient_policy(&other),
        BlockState {
            sender_blocks_recipient: i_block,
            recipient_blocks_sender: they_block,
        },
    )
    .map_err(|denial| ApiError::permission(denial.message()))?;

    let message_id = Uuid::new_v4();
    let row = state
        .db
        .insert_message(&message_id.to_string(), &conversation.id, &me, &req.content)?;

    Ok(created(MessageResponse {
        id: message_id,
        conversation_id,
        sender_id: claims.sub,
        content: row.content,
        read_by: vec![claims.sub],
        created_at: parse_timestamp(&row.created_at),
    }))
}

/// Non-deleted messages in chronological order, offset-paginated.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let me = claims.sub.to_string();
    let conversation = require_conversation(&state.db, &conversation_id)?;
    require_participant(&conversation, &me)?;

    let (page, limit, offset) = query.clamped();

    // Run the listing and the receipt batch off the async runtime
    let db = state.clone();
    let cid = conversation.id.clone();
    let (messages, total) = tokio::task::spawn_blocking(move || {
        let total = db.db.count_messages(&cid)?;
        let mut rows = db.db.list_messages(&cid, limit, offset)?;
        // Fetched newest-first for the offset window, returned oldest-first
        rows.reverse();

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reads = db.db.get_reads_for_messages(&ids)?;

        let messages = rows
            .iter()
            .map(|row| message_response(row, &reads))
            .collect::<ApiResult<Vec<_>>>()?;

        Ok::<_, ApiError>((messages, total))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(paginated(messages, Pagination { page, limit, total }))
}

/// Receipts every message the caller has not read and zeroes their unread
/// counter.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let me = claims.sub.to_string();
    let conversation = require_conversation(&state.db, &conversation_id)?;
    require_participant(&conversation, &me)?;

    let marked = state.db.mark_conversation_read(&conversation.id, &me)?;
    Ok(ok(serde_json::json!({ "marked_read": marked })))
}

// -- Helpers --

fn require_conversation(db: &Database, conversation_id: &Uuid) -> ApiResult<ConversationRow> {
    db.get_conversation(&conversation_id.to_string())?
        .ok_or_else(|| ApiError::not_found("conversation not found"))
}

fn require_participant(conversation: &ConversationRow, user_id: &str) -> ApiResult<()> {
    if !conversation.is_participant(user_id) {
        return Err(ApiError::permission(
            "you are not a participant in this conversation",
        ));
    }
    Ok(())
}

pub(crate) fn message_response(
    row: &MessageRow,
    reads: &[MessageReadRow],
) -> ApiResult<MessageResponse> {
    let read_by = reads
        .iter()
        .filter(|r| r.message_id == row.id)
        .filter_map(|r| r.user_id.parse::<Uuid>().ok())
        .collect();

    Ok(MessageResponse {
        id: row
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt message id '{}': {}", row.id, e))?,
        conversation_id: row
            .conversation_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt conversation id '{}': {}", row.conversation_id, e))?,
        sender_id: row
            .sender_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt sender id '{}': {}", row.sender_id, e))?,
        content: row.content.clone(),
        read_by,
        created_at: parse_timestamp(&row.created_at),
    })
}
