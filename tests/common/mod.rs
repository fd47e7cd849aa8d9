#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bizops_api::auth::{generate_jwt, Claims, Role};
use bizops_api::backend::{Backend, MemoryBackend, Row};
use bizops_api::config::AppConfig;
use bizops_api::integrations::{
    AccessToken, CarrierApi, CarrierCall, FacebookApi, IntegrationError, ManagedPage, ZaloApi, ZaloOfficialAccount,
    ZaloToken,
};
use bizops_api::middleware::RateLimiter;
use bizops_api::{build_router, AppState};

pub const JWT_SECRET: &str = "test-secret";
pub const APP_URL: &str = "https://app.test";
pub const PAGE_TOKEN: &str = "PAGE_TOKEN_SECRET";

#[derive(Default)]
pub struct FakeFacebook {
    pub pages: Vec<ManagedPage>,
    pub fail_exchange: bool,
    pub calls: AtomicUsize,
    pub tokens_used: Mutex<Vec<String>>,
}

impl FakeFacebook {
    pub fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(id, name)| ManagedPage {
                    id: id.to_string(),
                    name: name.to_string(),
                    access_token: format!("{}-{}", PAGE_TOKEN, id),
                    category: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FacebookApi for FakeFacebook {
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange {
            return Err(IntegrationError::Upstream {
                service: "Facebook",
                status: 400,
                message: "Invalid verification code format.".into(),
            });
        }
        Ok(AccessToken { access_token: format!("short-{}", code), token_type: None, expires_in: Some(3600) })
    }

    async fn exchange_long_lived(&self, short_token: &str) -> Result<AccessToken, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken { access_token: format!("long-{}", short_token), token_type: None, expires_in: None })
    }

    async fn list_pages(&self, _user_token: &str) -> Result<Vec<ManagedPage>, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.clone())
    }

    async fn video_stats(&self, video_id: &str, page_token: &str) -> Result<Value, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_used.lock().unwrap().push(page_token.to_string());
        Ok(json!({ "id": video_id, "views": 1200 }))
    }

    async fn reel_stats(&self, video_id: &str, page_token: &str) -> Result<Value, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_used.lock().unwrap().push(page_token.to_string());
        Ok(json!({ "data": [{ "name": "blue_reels_play_count", "values": [{ "value": 77 }] }], "id": video_id }))
    }
}

#[derive(Default)]
pub struct FakeZalo {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ZaloApi for FakeZalo {
    async fn exchange_code(&self, code: &str) -> Result<ZaloToken, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ZaloToken {
            access_token: format!("zalo-{}", code),
            refresh_token: Some("zalo-refresh".into()),
            expires_in: Some(90000),
        })
    }

    async fn oa_profile(&self, _access_token: &str) -> Result<ZaloOfficialAccount, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ZaloOfficialAccount { oa_id: "4321".into(), name: "Shop Zalo".into() })
    }
}

#[derive(Default)]
pub struct FakeCarrier {
    pub calls: Mutex<Vec<CarrierCall>>,
}

#[async_trait]
impl CarrierApi for FakeCarrier {
    async fn send(&self, call: CarrierCall, _token: Option<&str>) -> Result<Value, IntegrationError> {
        let path = call.path.clone();
        self.calls.lock().unwrap().push(call);
        Ok(json!({ "status": 200, "error": false, "data": { "path": path } }))
    }
}

pub struct TestApp {
    pub config: AppConfig,
    pub backend: Arc<MemoryBackend>,
    pub facebook: Arc<FakeFacebook>,
    pub zalo: Arc<FakeZalo>,
    pub carrier: Arc<FakeCarrier>,
    pub limiter: Arc<RateLimiter>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.server.app_url = APP_URL.to_string();
    config.security.jwt_secret = JWT_SECRET.to_string();
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), FakeFacebook::default())
    }

    pub fn with(config: AppConfig, facebook: FakeFacebook) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::from_config(&config.api)),
            config,
            backend: Arc::new(MemoryBackend::new()),
            facebook: Arc::new(facebook),
            zalo: Arc::new(FakeZalo::default()),
            carrier: Arc::new(FakeCarrier::default()),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: Arc::new(self.config.clone()),
            backend: self.backend.clone() as Arc<dyn Backend>,
            facebook: self.facebook.clone(),
            zalo: self.zalo.clone(),
            carrier: self.carrier.clone(),
            limiter: self.limiter.clone(),
        }
    }

    /// Router sharing this app's backend, fakes and limiter
    pub fn router(&self) -> Router {
        build_router(self.state())
    }

    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let rows: Vec<Row> = rows.into_iter().filter_map(|v| v.as_object().cloned()).collect();
        self.backend.seed(table, rows).await;
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(json_request("POST", uri, body, token, None)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(json_request("PUT", uri, body, token, None)).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send_via(self.router(), request).await
    }
}

/// Drive one request through `router` and collect the parts tests assert on
pub async fn send_via(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse { status, location, retry_after, body }
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>, client_ip: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(ip) = client_ip {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub retry_after: Option<String>,
    pub body: Value,
}

pub fn token(tenant_id: Uuid, role: Role) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let claims = Claims::new(user_id, tenant_id, role, 1);
    (user_id, generate_jwt(&claims, JWT_SECRET).unwrap())
}

/// Serve the router on a real socket, the way the binary does
pub async fn spawn_server(router: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .ok();
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(format!("{}/health", base_url)).send().await.is_ok() {
            return Ok(base_url);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("server did not become ready on {}", base_url)
}
