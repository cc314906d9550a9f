#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use stockpile_api::config::ServerConfig;
use stockpile_api::router::build_app_router;
use stockpile_api::state::AppState;
use stockpile_backup::bucket::MemoryBucket;
use stockpile_backup::{BackupContext, BackupService, PoolConfig, WorkerPool};
use stockpile_db::store::memory::MemoryJobStore;
use stockpile_db::store::RegistrySet;
use tokio_util::sync::CancellationToken;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        storage_root: "./unused".into(),
        database_url: None,
    }
}

/// The app plus handles on its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub registries: RegistrySet,
    pub bucket: Arc<MemoryBucket>,
    pub service: BackupService,
    pub cancel: CancellationToken,
}

/// Build the full application router over in-memory stores.
///
/// Uses the same router builder as `main.rs`, so tests exercise the
/// production middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery, body limit).
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let registries = RegistrySet::in_memory();
    let bucket = Arc::new(MemoryBucket::new());
    let ctx = BackupContext::new(
        Arc::new(MemoryJobStore::new()),
        registries.clone(),
        bucket.clone(),
    );
    let cancel = CancellationToken::new();
    let pool = WorkerPool::start(ctx.clone(), PoolConfig::default(), cancel.clone());
    let service = BackupService::new(ctx, pool);

    let state = AppState {
        backup: service.clone(),
        config: Arc::new(config.clone()),
        db: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        registries,
        bucket,
        service,
        cancel,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        send(&self.router, Method::GET, uri, Body::empty(), None).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        send(&self.router, Method::DELETE, uri, Body::empty(), None).await
    }

    pub async fn post_json(&self, uri: &str, json: Value) -> Response<Body> {
        send(
            &self.router,
            Method::POST,
            uri,
            Body::from(json.to_string()),
            Some("application/json"),
        )
        .await
    }

    pub async fn post_bytes(&self, uri: &str, bytes: Vec<u8>) -> Response<Body> {
        send(
            &self.router,
            Method::POST,
            uri,
            Body::from(bytes),
            Some("application/xml"),
        )
        .await
    }

    /// Poll `GET uri` until `data.status` is terminal, returning `data`.
    pub async fn wait_terminal(&self, uri: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let json = body_json(self.get(uri).await).await;
            let status = json["data"]["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return json["data"].clone();
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {uri}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Body,
    content_type: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the parsed body.
pub async fn expect_status(response: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
