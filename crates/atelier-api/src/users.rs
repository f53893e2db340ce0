use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use atelier_db::Database;
use atelier_db::models::{UserRow, UserSummaryRow, parse_timestamp};
use atelier_types::api::{
    Claims, MessageSettings, UpdateProfileRequest, UpdateSettingsRequest, UserProfile, UserSummary,
};
use atelier_types::models::MessagePermission;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, ok};
use crate::middleware::MaybeClaims;
use crate::permissions::RecipientPolicy;

const DISPLAY_NAME_MAX_LEN: usize = 100;
const BIO_MAX_LEN: usize = 500;
const URL_MAX_LEN: usize = 500;

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let user = require_user(&state.db, &claims.sub.to_string())?;
    Ok(ok(profile_response(&state.db, &user)?))
}

/// Public profile. A viewer the profile owner has blocked is turned away.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
) -> ApiResult<Response> {
    let user = require_user_by_username(&state.db, &username)?;

    if let Some(viewer) = claims {
        if state.db.is_blocked(&user.id, &viewer.sub.to_string())? {
            return Err(ApiError::permission("this profile is not available"));
        }
    }

    Ok(ok(profile_response(&state.db, &user)?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Response> {
    let current = require_user(&state.db, &claims.sub.to_string())?;

    let display_name = req.display_name.or(current.display_name);
    let bio = req.bio.or(current.bio);
    let avatar_url = req.avatar_url.or(current.avatar_url);
    let website = req.website.or(current.website);

    if display_name.as_deref().is_some_and(|s| s.len() > DISPLAY_NAME_MAX_LEN) {
        return Err(ApiError::validation("display name is too long"));
    }
    if bio.as_deref().is_some_and(|s| s.len() > BIO_MAX_LEN) {
        return Err(ApiError::validation("bio is too long"));
    }
    if avatar_url.as_deref().is_some_and(|s| s.len() > URL_MAX_LEN)
        || website.as_deref().is_some_and(|s| s.len() > URL_MAX_LEN)
    {
        return Err(ApiError::validation("url is too long"));
    }

    state.db.update_profile(
        &current.id,
        display_name.as_deref(),
        bio.as_deref(),
        avatar_url.as_deref(),
        website.as_deref(),
    )?;

    let updated = require_user(&state.db, &current.id)?;
    Ok(ok(profile_response(&state.db, &updated)?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Response> {
    let current = require_user(&state.db, &claims.sub.to_string())?;

    let message_permission = req
        .message_permission
        .unwrap_or_else(|| MessagePermission::parse(&current.message_permission));
    let allow_messages = req.allow_messages.unwrap_or(current.allow_messages);

    state.db.update_message_settings(
        &current.id,
        message_permission.as_str(),
        allow_messages,
    )?;

    Ok(ok(MessageSettings {
        message_permission,
        allow_messages,
    }))
}

// -- Shared user helpers --

pub(crate) fn require_user(db: &Database, id: &str) -> ApiResult<UserRow> {
    db.get_user_by_id(id)?
        .ok_or_else(|| ApiError::not_found("user not found"))
}

pub(crate) fn require_user_by_username(db: &Database, username: &str) -> ApiResult<UserRow> {
    db.get_user_by_username(username)?
        .ok_or_else(|| ApiError::not_found("user not found"))
}

pub(crate) fn parse_user_id(id: &str) -> anyhow::Result<Uuid> {
    id.parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", id, e))
}

pub(crate) fn user_summary(row: &UserRow) -> anyhow::Result<UserSummary> {
    Ok(UserSummary {
        id: parse_user_id(&row.id)?,
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        avatar_url: row.avatar_url.clone(),
    })
}

pub(crate) fn summary_from_row(row: &UserSummaryRow) -> anyhow::Result<UserSummary> {
    Ok(UserSummary {
        id: parse_user_id(&row.id)?,
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        avatar_url: row.avatar_url.clone(),
    })
}

pub(crate) fn recipient_policy(row: &UserRow) -> RecipientPolicy {
    RecipientPolicy {
        message_permission: MessagePermission::parse(&row.message_permission),
        allow_messages: row.allow_messages,
    }
}

fn profile_response(db: &Database, user: &UserRow) -> ApiResult<UserProfile> {
    let (followers, following) = db.follow_counts(&user.id)?;
    Ok(UserProfile {
        id: parse_user_id(&user.id)?,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        bio: user.bio.clone(),
        avatar_url: user.avatar_url.clone(),
        website: user.website.clone(),
        followers,
        following,
        created_at: parse_timestamp(&user.created_at),
    })
}
