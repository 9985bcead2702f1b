//! API integration tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{test_app, test_app_with};

/// Test that health endpoint works without authentication.
#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;
    let (status, json) = app.get("/api/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "success");
    assert_eq!(json["msg"], "");
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let app = test_app().await;
    let (status, json) = app.get("/api/v1/streams", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["result"], "error");
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["msg"], "Missing or invalid authorization");
}

#[tokio::test]
async fn test_unknown_api_key_is_unauthorized() {
    let app = test_app().await;
    let (status, json) = app.get("/api/v1/streams", Some("not-a-key")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["msg"], "Invalid API key");
}

#[tokio::test]
async fn test_malformed_body_renders_error_envelope() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/me/subscriptions")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.member_key))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["result"], "error");
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_subscribe_then_read_stream() {
    let app = test_app().await;
    let stream_id = app.member_stream("design").await;

    let (status, json) = app
        .get(&format!("/api/v1/streams/{}", stream_id), Some(&app.member_key))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stream"]["name"], "design");

    let (status, json) = app
        .get("/api/v1/users/me/subscriptions", Some(&app.member_key))
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["subscriptions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["design"]);

    let (status, json) = app
        .get(
            &format!("/api/v1/streams/{}/members", stream_id),
            Some(&app.owner_key),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subscribers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_subscribing_twice_reports_already_subscribed() {
    let app = test_app().await;
    app.member_stream("design").await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/users/me/subscriptions",
            Some(&app.member_key),
            Some(json!({ "subscriptions": [{ "name": "design" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subscribed"], json!({}));
    assert_eq!(json["already_subscribed"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_stream_is_not_found() {
    let app = test_app().await;
    let (status, json) = app.get("/api/v1/streams/9999", Some(&app.member_key)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["msg"], "Invalid channel ID");
}

#[tokio::test]
async fn test_member_cannot_administer_stream() {
    let app = test_app().await;
    let stream_id = app.member_stream("design").await;

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/streams/{}", stream_id),
            Some(&app.member_key),
            Some(json!({ "description": "new" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["msg"], "Insufficient permission");

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/streams/{}", stream_id),
            Some(&app.owner_key),
            Some(json!({ "description": "new" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = app
        .get(&format!("/api/v1/streams/{}", stream_id), Some(&app.member_key))
        .await;
    assert_eq!(json["stream"]["description"], "new");
}

#[tokio::test]
async fn test_failed_compose_rolls_back_the_add() {
    let app = test_app().await;

    let (status, json) = app
        .send(
            Method::PATCH,
            "/api/v1/users/me/subscriptions",
            Some(&app.member_key),
            Some(json!({ "add": [{ "name": "fresh" }], "delete": ["ghost"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["msg"], "Channel(s) (ghost) do not exist");

    let (status, json) = app
        .get("/api/v1/get_stream_id?stream=fresh", Some(&app.member_key))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["msg"], "Invalid channel name 'fresh'");
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_compose_requires_add_or_delete() {
    let app = test_app().await;
    let (status, json) = app
        .send(
            Method::PATCH,
            "/api/v1/users/me/subscriptions",
            Some(&app.member_key),
            Some(json!({})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["msg"],
        "Nothing to do. Specify at least one of \"add\" or \"delete\"."
    );
}

#[tokio::test]
async fn test_anonymous_topics_need_web_public_stream() {
    let app = test_app().await;
    let stream_id = app.member_stream("design").await;

    let (status, json) = app
        .get(&format!("/api/v1/users/me/{}/topics", stream_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["msg"], "Invalid channel ID");

    let (status, json) = app
        .get(
            &format!("/api/v1/users/me/{}/topics", stream_id),
            Some(&app.member_key),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["topics"], json!([]));
}

#[tokio::test]
async fn test_anonymous_topics_on_web_public_stream() {
    let app = test_app_with(true).await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users/me/subscriptions",
            Some(&app.owner_key),
            Some(json!({ "subscriptions": [{ "name": "announce" }], "is_web_public": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = app
        .get("/api/v1/get_stream_id?stream=announce", Some(&app.owner_key))
        .await;
    let stream_id = json["stream_id"].as_i64().unwrap();

    let (status, json) = app
        .get(&format!("/api/v1/users/me/{}/topics", stream_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["topics"], json!([]));
}

#[tokio::test]
async fn test_delete_topic_requires_admin() {
    let app = test_app().await;
    let stream_id = app.member_stream("design").await;

    let (status, json) = app
        .send(
            Method::POST,
            &format!("/api/v1/streams/{}/delete_topic", stream_id),
            Some(&app.member_key),
            Some(json!({ "topic_name": "lunch" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["msg"], "Must be an organization administrator");

    let (status, json) = app
        .send(
            Method::POST,
            &format!("/api/v1/streams/{}/delete_topic", stream_id),
            Some(&app.owner_key),
            Some(json!({ "topic_name": "lunch" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["complete"], true);
}

#[tokio::test]
async fn test_default_stream_group_lifecycle() {
    let app = test_app().await;
    app.member_stream("design").await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/default_stream_groups/create",
            Some(&app.member_key),
            Some(json!({ "group_name": "team", "stream_names": ["design"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json["msg"],
        "You do not have permission to change default channels."
    );

    let (status, json) = app
        .send(
            Method::POST,
            "/api/v1/default_stream_groups/create",
            Some(&app.owner_key),
            Some(json!({ "group_name": "team", "stream_names": ["design"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let group_id = json["group_id"].as_i64().unwrap();

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/default_stream_groups/{}/streams", group_id),
            Some(&app.owner_key),
            Some(json!({ "op": "swap", "stream_names": ["design"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["msg"],
        "Invalid value for \"op\". Specify one of \"add\" or \"remove\"."
    );

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/default_stream_groups/{}", group_id),
            Some(&app.owner_key),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = app
        .get("/api/v1/default_stream_groups", Some(&app.member_key))
        .await;
    assert_eq!(json["default_stream_groups"], json!([]));
}

#[tokio::test]
async fn test_stream_email_address() {
    let app = test_app().await;
    let stream_id = app.member_stream("Design Team").await;

    let (status, json) = app
        .get(
            &format!("/api/v1/streams/{}/email_address", stream_id),
            Some(&app.member_key),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let email = json["email"].as_str().unwrap();
    assert!(email.starts_with("design-team."));
    assert!(email.ends_with(".show-sender@zulip.example.com"));
}

#[tokio::test]
async fn test_integrations_are_public() {
    let app = test_app().await;

    let (status, json) = app.get("/api/v1/integrations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!json["integrations"].as_array().unwrap().is_empty());

    let (status, json) = app.get("/api/v1/integrations/github", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["integration"]["name"], "github");

    let (status, json) = app.get("/api/v1/integrations/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["msg"], "Integration 'nope' not found");
}
