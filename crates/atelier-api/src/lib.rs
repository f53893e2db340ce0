pub mod auth;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod permissions;
pub mod projects;
pub mod reviews;
pub mod social;
pub mod users;

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post, put};

pub use auth::{AppState, AppStateInner};

/// The full route table. Public, optionally-authenticated and protected
/// routes are built separately so each group carries its own middleware,
/// then merged.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/projects/{project_id}/reviews", get(reviews::list_reviews))
        .with_state(state.clone());

    // Anonymous requests pass through; a bearer token personalizes the
    // response (and deduplicates project views).
    let optional_routes = Router::new()
        .route("/users/{username}", get(users::get_profile))
        .route("/projects", get(projects::list_projects))
        .route("/projects/{project_id}", get(projects::get_project))
        .layer(from_fn(middleware::optional_auth))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/me", get(users::me).put(users::update_profile))
        .route("/users/me/settings", put(users::update_settings))
        .route(
            "/users/{username}/follow",
            post(social::follow_user).delete(social::unfollow_user),
        )
        .route(
            "/users/{username}/block",
            post(social::block_user).delete(social::unblock_user),
        )
        .route("/users/{username}/followers", get(social::list_followers))
        .route("/users/{username}/following", get(social::list_following))
        .route("/projects", post(projects::create_project))
        .route(
            "/projects/{project_id}",
            put(projects::update_project).delete(projects::delete_project),
        )
        .route("/projects/{project_id}/like", post(projects::toggle_like))
        .route(
            "/projects/{project_id}/reviews",
            post(reviews::upsert_review).delete(reviews::delete_review),
        )
        .route("/conversations", get(conversations::list_conversations))
        .route(
            "/conversation/{id}",
            get(conversations::get_or_create).delete(conversations::delete_conversation),
        )
        .route(
            "/conversation/{id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/conversation/{id}/read", put(messages::mark_read))
        .layer(from_fn(middleware::require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes)
}
