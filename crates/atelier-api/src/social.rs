use axum::{
    Extension,
    extract::{Path, State},
    response::Response,
};
use serde_json::json;

use atelier_types::api::{Claims, UserSummary};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, ok};
use crate::users::{require_user_by_username, summary_from_row};

pub async fn follow_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let target = require_user_by_username(&state.db, &username)?;
    let me = claims.sub.to_string();

    if target.id == me {
        return Err(ApiError::validation("you cannot follow yourself"));
    }

    let (i_block, they_block) = state.db.blocked_between(&me, &target.id)?;
    if i_block || they_block {
        return Err(ApiError::permission("you cannot follow this user"));
    }

    state.db.follow(&me, &target.id)?;
    Ok(ok(json!({ "following": true })))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let target = require_user_by_username(&state.db, &username)?;
    state.db.unfollow(&claims.sub.to_string(), &target.id)?;
    Ok(ok(json!({ "following": false })))
}

/// Blocking also severs follow edges in both directions.
pub async fn block_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let target = require_user_by_username(&state.db, &username)?;
    let me = claims.sub.to_string();

    if target.id == me {
        return Err(ApiError::validation("you cannot block yourself"));
    }

    state.db.block(&me, &target.id)?;
    Ok(ok(json!({ "blocked": true })))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let target = require_user_by_username(&state.db, &username)?;
    state.db.unblock(&claims.sub.to_string(), &target.id)?;
    Ok(ok(json!({ "blocked": false })))
}

pub async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Response> {
    let user = require_user_by_username(&state.db, &username)?;
    let rows = state.db.list_followers(&user.id)?;
    let followers: Vec<UserSummary> = rows
        .iter()
        .map(summary_from_row)
        .collect::<anyhow::Result<_>>()?;
    Ok(ok(followers))
}

pub async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Response> {
    let user = require_user_by_username(&state.db, &username)?;
    let rows = state.db.list_following(&user.id)?;
    let following: Vec<UserSummary> = rows
        .iter()
        .map(summary_from_row)
        .collect::<anyhow::Result<_>>()?;
    Ok(ok(following))
}
