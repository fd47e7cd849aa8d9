mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use bizops_api::config::AppConfig;
use common::{json_request, test_config, FakeFacebook, TestApp, PAGE_TOKEN};

const PAGE_ID: &str = "1029384756";

async fn connected_app() -> (TestApp, Uuid) {
    connected_app_with(test_config()).await
}

async fn connected_app_with(config: AppConfig) -> (TestApp, Uuid) {
    let app = TestApp::with(config, FakeFacebook::default());
    let tenant = Uuid::new_v4();
    app.seed(
        "social_connections",
        vec![json!({
            "tenant_id": tenant,
            "platform": "facebook",
            "page_id": PAGE_ID,
            "page_name": "Shop A",
            "access_token": PAGE_TOKEN,
            "is_active": true
        })],
    )
    .await;
    (app, tenant)
}

fn video_request(tenant: Uuid, video: Value) -> Value {
    let mut body = json!({ "action": "get_video_stats", "tenant_id": tenant, "page_id": PAGE_ID });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), video.as_object()) {
        body.extend(extra.clone());
    }
    body
}

#[tokio::test]
async fn video_stats_use_the_stored_token_without_exposing_it() {
    let (app, tenant) = connected_app().await;

    let res = app
        .post_json("/api/facebook/metrics", video_request(tenant, json!({ "video_id": "555" })), None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["views"], 1200);
    assert!(!res.body.to_string().contains(PAGE_TOKEN));
    assert_eq!(app.facebook.tokens_used.lock().unwrap().as_slice(), [PAGE_TOKEN.to_string()]);
}

#[tokio::test]
async fn batch_reel_stats_keep_request_order() {
    let (app, tenant) = connected_app().await;
    let body = json!({
        "action": "get_reel_stats",
        "tenant_id": tenant,
        "page_id": PAGE_ID,
        "video_ids": ["9", "8", "7"]
    });

    let res = app.post_json("/api/facebook/metrics", body, None).await;

    assert_eq!(res.status, StatusCode::OK);
    let ids: Vec<&str> = res.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["video_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["9", "8", "7"]);
}

#[tokio::test]
async fn unknown_page_and_bad_requests_are_rejected() {
    let (app, _) = connected_app().await;

    let res = app
        .post_json("/api/facebook/metrics", video_request(Uuid::new_v4(), json!({ "video_id": "555" })), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post_json("/api/facebook/metrics", json!({ "action": "get_page_token", "page_id": PAGE_ID }), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post_json("/api/facebook/metrics", video_request(Uuid::new_v4(), json!({ "video_id": "me/accounts" })), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.facebook.call_count(), 0);
}

#[tokio::test]
async fn thirty_first_request_behind_a_trusted_proxy_is_limited() {
    let mut config = test_config();
    config.api.trusted_proxy_hops = 1;
    let (app, tenant) = connected_app_with(config).await;
    let body = video_request(tenant, json!({ "video_id": "555" }));

    for i in 1..=30 {
        let res = app
            .send(json_request("POST", "/api/facebook/metrics", body.clone(), None, Some("203.0.113.7")))
            .await;
        assert_ne!(res.status, StatusCode::TOO_MANY_REQUESTS, "request {} was limited", i);
    }

    let res = app
        .send(json_request("POST", "/api/facebook/metrics", body.clone(), None, Some("203.0.113.7")))
        .await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["code"], "TOO_MANY_REQUESTS");
    assert!(res.retry_after.is_some());

    let res = app
        .send(json_request("POST", "/api/facebook/metrics", body, None, Some("198.51.100.1")))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn socket_peer_is_limited_even_when_forwarded_for_rotates() -> anyhow::Result<()> {
    let (app, tenant) = connected_app().await;
    let base_url = common::spawn_server(app.router()).await?;
    let client = reqwest::Client::new();
    let body = video_request(tenant, json!({ "video_id": "555" }));
    let url = format!("{}/api/facebook/metrics", base_url);

    for i in 0..30 {
        let res = client
            .post(&url)
            .header("x-forwarded-for", format!("10.20.{}.{}", i / 200, i % 200))
            .json(&body)
            .send()
            .await?;
        assert_eq!(res.status(), reqwest::StatusCode::OK, "request {}", i + 1);
    }
    let res = client
        .post(&url)
        .header("x-forwarded-for", "172.16.99.99")
        .json(&body)
        .send()
        .await?;
    assert_eq!(res.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));

    // Other routes are not limited
    let res = client.get(format!("{}/health", base_url)).send().await?;
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    Ok(())
}
