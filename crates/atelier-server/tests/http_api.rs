//! End-to-end coverage of the route table: auth, social graph, projects,
//! and the messaging permission scenarios.

use std::sync::Arc;

use atelier_api::{AppState, AppStateInner, router};
use atelier_db::Database;
use atelier_db::models::ParticipantPair;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn test_app() -> (Router, AppState) {
    let db = Database::open_in_memory().unwrap();
    let state: AppState = Arc::new(AppStateInner {
        db,
        // Matches the middleware's dev fallback secret
        jwt_secret: "dev-secret-change-me".into(),
    });
    (router(state.clone()), state)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Registers a user and returns (token, user id).
async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    assert_eq!(body["success"], json!(true));
    (
        body["data"]["token"].as_str().unwrap().to_string(),
        body["data"]["user_id"].as_str().unwrap().to_string(),
    )
}

async fn set_settings(app: &Router, token: &str, settings: Value) {
    let (status, body) = call(app, "PUT", "/users/me/settings", Some(token), Some(settings)).await;
    assert_eq!(status, StatusCode::OK, "settings update failed: {body}");
}

async fn open_conversation(app: &Router, token: &str, other_user_id: &str) -> (StatusCode, Value) {
    call(
        app,
        "GET",
        &format!("/conversation/{other_user_id}"),
        Some(token),
        None,
    )
    .await
}

async fn send_message(
    app: &Router,
    token: &str,
    conversation_id: &str,
    content: &str,
) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        &format!("/conversation/{conversation_id}/messages"),
        Some(token),
        Some(json!({ "content": content })),
    )
    .await
}

// -- Auth --

#[tokio::test]
async fn register_login_and_fetch_own_profile() {
    let (app, _) = test_app();
    let (token, _) = register(&app, "alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].as_str().is_some());

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, body) = call(&app, "GET", "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], json!("alice"));

    // No token, protected route
    let (status, body) = call(&app, "GET", "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let (app, _) = test_app();
    register(&app, "alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

// -- Conversation lifecycle --

#[tokio::test]
async fn get_or_create_returns_the_same_conversation_every_time() {
    let (app, _) = test_app();
    let (alice, alice_id) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    let (status, first) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = first["data"]["id"].as_str().unwrap().to_string();

    let (status, second) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["id"].as_str().unwrap(), conversation_id);

    // Same conversation from the other side
    let (status, third) = open_conversation(&app, &bob, &alice_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["data"]["id"].as_str().unwrap(), conversation_id);
}

#[tokio::test]
async fn conversation_with_yourself_or_a_stranger_id_fails() {
    let (app, _) = test_app();
    let (alice, alice_id) = register(&app, "alice").await;

    let (status, _) = open_conversation(&app, &alice, &alice_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = open_conversation(&app, &alice, &Uuid::new_v4().to_string()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_flow_updates_unread_counters_and_receipts() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    let (_, body) = open_conversation(&app, &alice, &bob_id).await;
    let cid = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send_message(&app, &alice, &cid, "hello bob").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send_message(&app, &alice, &cid, "are you there?").await;
    assert_eq!(status, StatusCode::CREATED);

    // Bob sees one conversation with two unread, annotated with alice
    let (status, body) = call(&app, "GET", "/conversations", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["unread_count"], json!(2));
    assert_eq!(listed[0]["participant"]["username"], json!("alice"));
    assert_eq!(listed[0]["last_message"]["content"], json!("are you there?"));

    // Alice's own counter is untouched
    let (_, body) = call(&app, "GET", "/conversations", Some(&alice), None).await;
    assert_eq!(body["data"][0]["unread_count"], json!(0));

    // Mark read zeroes the counter and receipts both messages
    let (status, body) = call(
        &app,
        "PUT",
        &format!("/conversation/{cid}/read"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["marked_read"], json!(2));

    let (_, body) = call(&app, "GET", "/conversations", Some(&bob), None).await;
    assert_eq!(body["data"][0]["unread_count"], json!(0));

    // Chronological listing with pagination metadata
    let (status, body) = call(
        &app,
        "GET",
        &format!("/conversation/{cid}/messages?page=1&limit=10"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], json!("hello bob"));
    assert_eq!(messages[1]["content"], json!("are you there?"));
    assert_eq!(messages[1]["read_by"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], json!(2));
}

#[tokio::test]
async fn message_content_is_validated() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (_bob, bob_id) = register(&app, "bob").await;

    let (_, body) = open_conversation(&app, &alice, &bob_id).await;
    let cid = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send_message(&app, &alice, &cid, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "x".repeat(2001);
    let (status, _) = send_message(&app, &alice, &cid, &long).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An outsider cannot read or write the conversation
    let (carol, _) = register(&app, "carol").await;
    let (status, _) = send_message(&app, &carol, &cid, "let me in").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &app,
        "GET",
        &format!("/conversation/{cid}/messages"),
        Some(&carol),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// -- Permission scenarios --

#[tokio::test]
async fn permission_none_stops_new_and_existing_conversations() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    // Existing conversation first, then bob turns messaging off
    let (_, body) = open_conversation(&app, &alice, &bob_id).await;
    let cid = body["data"]["id"].as_str().unwrap().to_string();

    set_settings(&app, &bob, json!({ "message_permission": "none" })).await;

    let (status, _) = send_message(&app, &alice, &cid, "hello?").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // And no new conversation can be opened against bob either
    let (carol, _) = register(&app, "carol").await;
    let (status, _) = open_conversation(&app, &carol, &bob_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Bob can still send into his own conversation: alice accepts messages
    let (status, _) = send_message(&app, &bob, &cid, "i can still write").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn permission_followers_requires_an_edge_in_either_direction() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    set_settings(&app, &bob, json!({ "message_permission": "followers" })).await;

    let (status, _) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Bob following alice is enough
    let (status, _) = call(&app, "POST", "/users/alice/follow", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::OK);

    // The other direction works too
    let (carol, _) = register(&app, "carol").await;
    let (status, _) = call(&app, "POST", "/users/bob/follow", Some(&carol), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = open_conversation(&app, &carol, &bob_id).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn permission_existing_rejects_first_contact_but_allows_seeded_conversations() {
    let (app, state) = test_app();
    let (alice, alice_id) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    set_settings(&app, &bob, json!({ "message_permission": "existing" })).await;

    let (status, _) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Operator-seeded conversation, created behind the API's back
    let seeded = state
        .db
        .create_or_fetch_conversation(
            &Uuid::new_v4().to_string(),
            &ParticipantPair::new(&alice_id, &bob_id),
        )
        .unwrap();

    // The existing conversation is now reachable, and sends succeed even
    // though bob's setting has not changed
    let (status, body) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"].as_str().unwrap(), seeded.id);

    let (status, _) = send_message(&app, &alice, &seeded.id, "hello from outside").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&app, "GET", "/conversations", Some(&bob), None).await;
    assert_eq!(body["data"][0]["unread_count"], json!(1));
}

#[tokio::test]
async fn blocks_shut_down_messaging_in_both_directions() {
    let (app, _) = test_app();
    let (alice, alice_id) = register(&app, "alice").await;
    let (bob, bob_id) = register(&app, "bob").await;

    // Pre-existing conversation does not matter for blocks
    let (_, body) = open_conversation(&app, &alice, &bob_id).await;
    let cid = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", "/users/bob/block", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    // The blocked side cannot reopen or send
    let (status, _) = open_conversation(&app, &bob, &alice_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send_message(&app, &bob, &cid, "please").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Neither can the blocker
    let (status, _) = open_conversation(&app, &alice, &bob_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send_message(&app, &alice, &cid, "goodbye").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unblocking restores the conversation
    let (status, _) = call(&app, "DELETE", "/users/bob/block", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_message(&app, &bob, &cid, "we are back").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn only_participants_can_delete_a_conversation() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (_bob, bob_id) = register(&app, "bob").await;
    let (carol, _) = register(&app, "carol").await;

    let (_, body) = open_conversation(&app, &alice, &bob_id).await;
    let cid = body["data"]["id"].as_str().unwrap().to_string();
    send_message(&app, &alice, &cid, "for the record").await;

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/conversation/{cid}"),
        Some(&carol),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Conversation and messages are intact
    let (status, body) = call(
        &app,
        "GET",
        &format!("/conversation/{cid}/messages"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // A participant can delete, and the messages go with it
    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/conversation/{cid}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/conversations", Some(&alice), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let (status, _) = call(
        &app,
        "GET",
        &format!("/conversation/{cid}/messages"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Social graph over HTTP --

#[tokio::test]
async fn blocked_users_cannot_view_or_follow_the_blocker() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bob").await;

    let (status, _) = call(&app, "POST", "/users/bob/block", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", "/users/alice", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "POST", "/users/alice/follow", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Anonymous lookups still work
    let (status, body) = call(&app, "GET", "/users/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], json!("alice"));
}

#[tokio::test]
async fn blocking_removes_existing_follow_edges() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bob").await;

    let (status, _) = call(&app, "POST", "/users/bob/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "POST", "/users/alice/follow", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/users/bob", None, None).await;
    assert_eq!(body["data"]["followers"], json!(1));
    assert_eq!(body["data"]["following"], json!(1));

    let (status, _) = call(&app, "POST", "/users/bob/block", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/users/bob", None, None).await;
    assert_eq!(body["data"]["followers"], json!(0));
    assert_eq!(body["data"]["following"], json!(0));
}

// -- Projects & reviews --

#[tokio::test]
async fn project_lifecycle_with_views_likes_and_reviews() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bob").await;

    let (status, body) = call(
        &app,
        "POST",
        "/projects",
        Some(&alice),
        Some(json!({ "title": "Clay study", "description": "wip", "category": "sculpture" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let pid = body["data"]["id"].as_str().unwrap().to_string();

    // Anonymous views always count; bob's views count once
    let (_, body) = call(&app, "GET", &format!("/projects/{pid}"), None, None).await;
    assert_eq!(body["data"]["views"], json!(1));
    let (_, body) = call(&app, "GET", &format!("/projects/{pid}"), Some(&bob), None).await;
    assert_eq!(body["data"]["views"], json!(2));
    let (_, body) = call(&app, "GET", &format!("/projects/{pid}"), Some(&bob), None).await;
    assert_eq!(body["data"]["views"], json!(2));

    // Like toggle
    let (status, body) = call(
        &app,
        "POST",
        &format!("/projects/{pid}/like"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "liked": true, "likes": 1 }));

    // Reviews: owner is rejected, a second submission upserts
    let (status, _) = call(
        &app,
        "POST",
        &format!("/projects/{pid}/reviews"),
        Some(&alice),
        Some(json!({ "rating": "like" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/projects/{pid}/reviews"),
        Some(&bob),
        Some(json!({ "rating": "like", "comment": "love it" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/projects/{pid}/reviews"),
        Some(&bob),
        Some(json!({ "rating": "dislike" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", &format!("/projects/{pid}/reviews"), None, None).await;
    let reviews = body["data"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["rating"], json!("dislike"));

    // Only the owner can update or delete
    let (status, _) = call(
        &app,
        "PUT",
        &format!("/projects/{pid}"),
        Some(&bob),
        Some(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/projects/{pid}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &format!("/projects/{pid}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_listing_paginates_and_filters_by_owner() {
    let (app, _) = test_app();
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bob").await;

    for i in 0..3 {
        let (status, _) = call(
            &app,
            "POST",
            "/projects",
            Some(&alice),
            Some(json!({ "title": format!("piece {i}") })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = call(
        &app,
        "POST",
        "/projects",
        Some(&bob),
        Some(json!({ "title": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, "GET", "/projects?page=1&limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], json!(4));

    let (_, body) = call(&app, "GET", "/projects?owner=alice", None, None).await;
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|p| p["owner"]["username"] == json!("alice")));
}
