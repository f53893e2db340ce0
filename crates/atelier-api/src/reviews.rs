use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use atelier_db::models::{ReviewRow, parse_timestamp};
use atelier_types::api::{Claims, ReviewRequest, ReviewResponse, UserSummary};
use atelier_types::models::Rating;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, ok};
use crate::users::summary_from_row;

const COMMENT_MAX_LEN: usize = 1000;

/// One review per (project, user): a repeat submission overwrites the
/// previous rating and comment.
pub async fn upsert_review(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<Response> {
    if req.comment.as_deref().is_some_and(|c| c.len() > COMMENT_MAX_LEN) {
        return Err(ApiError::validation("comment is too long"));
    }

    let project = state
        .db
        .get_project(&project_id.to_string())?
        .ok_or_else(|| ApiError::not_found("project not found"))?;

    let me = claims.sub.to_string();
    if project.owner_id == me {
        return Err(ApiError::permission("you cannot review your own project"));
    }

    let review_id = Uuid::new_v4();
    let row = state.db.upsert_review(
        &review_id.to_string(),
        &project.id,
        &me,
        req.rating.as_str(),
        req.comment.as_deref(),
    )?;

    let author = state
        .db
        .get_user_by_id(&me)?
        .ok_or_else(|| anyhow::anyhow!("review author row missing for {}", me))?;

    Ok(ok(review_response(
        &row,
        UserSummary {
            id: claims.sub,
            username: author.username,
            display_name: author.display_name,
            avatar_url: author.avatar_url,
        },
    )?))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Response> {
    if state.db.get_project(&project_id.to_string())?.is_none() {
        return Err(ApiError::not_found("project not found"));
    }

    let rows = state.db.list_reviews(&project_id.to_string())?;
    let reviews = rows
        .iter()
        .map(|(review, author)| review_response(review, summary_from_row(author)?))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(ok(reviews))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    if state.db.get_project(&project_id.to_string())?.is_none() {
        return Err(ApiError::not_found("project not found"));
    }

    let deleted = state
        .db
        .delete_review(&project_id.to_string(), &claims.sub.to_string())?;

    if !deleted {
        return Err(ApiError::not_found("review not found"));
    }

    Ok(ok(serde_json::json!({ "deleted": true })))
}

fn review_response(row: &ReviewRow, author: UserSummary) -> ApiResult<ReviewResponse> {
    let rating = Rating::parse(&row.rating)
        .ok_or_else(|| anyhow::anyhow!("corrupt rating '{}' on review {}", row.rating, row.id))?;

    Ok(ReviewResponse {
        id: row
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt review id '{}': {}", row.id, e))?,
        project_id: row
            .project_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt project id '{}': {}", row.project_id, e))?,
        author,
        rating,
        comment: row.comment.clone(),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}
