use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

use atelier_db::Database;
use atelier_db::models::{ProjectRow, parse_timestamp};
use atelier_types::api::{
    Claims, CreateProjectRequest, LikeResponse, Pagination, ProjectResponse, UpdateProjectRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, created, ok, paginated};
use crate::middleware::MaybeClaims;
use crate::users::user_summary;

const TITLE_MAX_LEN: usize = 200;
const DESCRIPTION_MAX_LEN: usize = 5000;
const CATEGORY_MAX_LEN: usize = 100;
const URL_MAX_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub owner: Option<String>,
    pub category: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Response> {
    let title = req.title.trim().to_string();
    validate_fields(&title, req.description.as_deref(), req.category.as_deref(), req.image_url.as_deref())?;

    let project_id = Uuid::new_v4();
    state.db.insert_project(
        &project_id.to_string(),
        &claims.sub.to_string(),
        &title,
        req.description.as_deref(),
        req.category.as_deref(),
        req.image_url.as_deref(),
    )?;

    let row = state
        .db
        .get_project(&project_id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("project vanished after insert"))?;

    let viewer = claims.sub.to_string();
    Ok(created(project_response(&state.db, &row, Some(&viewer))?))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
) -> ApiResult<Response> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let offset = (page as u64 - 1) * limit as u64;

    // `owner` filters by username
    let owner_id = match query.owner.as_deref() {
        Some(username) => Some(
            state
                .db
                .get_user_by_username(username)?
                .ok_or_else(|| ApiError::not_found("user not found"))?
                .id,
        ),
        None => None,
    };

    let viewer = claims.map(|c| c.sub.to_string());

    // Run the listing and its per-row annotation off the async runtime
    let db = state.clone();
    let category = query.category.clone();
    let (projects, total) = tokio::task::spawn_blocking(move || {
        let rows = db
            .db
            .list_projects(owner_id.as_deref(), category.as_deref(), limit, offset)?;
        let total = db.db.count_projects(owner_id.as_deref(), category.as_deref())?;

        let projects = rows
            .iter()
            .map(|row| project_response(&db.db, row, viewer.as_deref()))
            .collect::<ApiResult<Vec<_>>>()?;

        Ok::<_, ApiError>((projects, total))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(paginated(projects, Pagination { page, limit, total }))
}

/// Anonymous views always increment the counter; authenticated views only
/// count once per viewer.
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
) -> ApiResult<Response> {
    let row = require_project(&state.db, &project_id)?;

    let viewer = claims.map(|c| c.sub.to_string());
    let views = state
        .db
        .record_project_view(&row.id, viewer.as_deref())?;

    let mut response = project_response(&state.db, &row, viewer.as_deref())?;
    response.views = views;
    Ok(ok(response))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Response> {
    let row = require_project(&state.db, &project_id)?;
    require_owner(&row, &claims)?;

    let title = req
        .title
        .map(|t| t.trim().to_string())
        .unwrap_or(row.title);
    let description = req.description.or(row.description);
    let category = req.category.or(row.category);
    let image_url = req.image_url.or(row.image_url);

    validate_fields(&title, description.as_deref(), category.as_deref(), image_url.as_deref())?;

    state.db.update_project(
        &row.id,
        &title,
        description.as_deref(),
        category.as_deref(),
        image_url.as_deref(),
    )?;

    let updated = require_project(&state.db, &project_id)?;
    let viewer = claims.sub.to_string();
    Ok(ok(project_response(&state.db, &updated, Some(&viewer))?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let row = require_project(&state.db, &project_id)?;
    require_owner(&row, &claims)?;

    state.db.delete_project(&row.id)?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let row = require_project(&state.db, &project_id)?;

    let (liked, likes) = state
        .db
        .toggle_project_like(&row.id, &claims.sub.to_string())?;

    Ok(ok(LikeResponse { liked, likes }))
}

// -- Helpers --

fn require_project(db: &Database, project_id: &Uuid) -> ApiResult<ProjectRow> {
    db.get_project(&project_id.to_string())?
        .ok_or_else(|| ApiError::not_found("project not found"))
}

fn require_owner(row: &ProjectRow, claims: &Claims) -> ApiResult<()> {
    if row.owner_id != claims.sub.to_string() {
        return Err(ApiError::permission("only the owner can modify a project"));
    }
    Ok(())
}

fn validate_fields(
    title: &str,
    description: Option<&str>,
    category: Option<&str>,
    image_url: Option<&str>,
) -> ApiResult<()> {
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    if title.len() > TITLE_MAX_LEN {
        return Err(ApiError::validation("title is too long"));
    }
    if description.is_some_and(|s| s.len() > DESCRIPTION_MAX_LEN) {
        return Err(ApiError::validation("description is too long"));
    }
    if category.is_some_and(|s| s.len() > CATEGORY_MAX_LEN) {
        return Err(ApiError::validation("category is too long"));
    }
    if image_url.is_some_and(|s| s.len() > URL_MAX_LEN) {
        return Err(ApiError::validation("image url is too long"));
    }
    Ok(())
}

pub(crate) fn project_response(
    db: &Database,
    row: &ProjectRow,
    viewer_id: Option<&str>,
) -> ApiResult<ProjectResponse> {
    let owner = db
        .get_user_by_id(&row.owner_id)?
        .ok_or_else(|| anyhow::anyhow!("project {} has no owner row", row.id))?;

    let likes = db.like_count(&row.id)?;
    let liked_by_me = match viewer_id {
        Some(uid) => db.user_likes_project(&row.id, uid)?,
        None => false,
    };

    Ok(ProjectResponse {
        id: row
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt project id '{}': {}", row.id, e))?,
        owner: user_summary(&owner)?,
        title: row.title.clone(),
        description: row.description.clone(),
        category: row.category.clone(),
        image_url: row.image_url.clone(),
        likes,
        liked_by_me,
        views: row.view_count.max(0) as u64,
        created_at: parse_timestamp(&row.created_at),
    })
}
