#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use dearly_api::clock::ManualClock;
use dearly_api::config::Config;
use dearly_api::files::BlobStore;
use dearly_api::{AppStateInner, build_router};
use dearly_db::Database;

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    _uploads: TempDir,
}

pub struct Response {
    pub status: StatusCode,
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestApp {
    /// Fresh in-memory app with a 5 second delivery delay.
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = Config::with_secret("integration-test-secret");
        config.delivery_delay = chrono::Duration::seconds(5);
        config.max_upload_bytes = 64 * 1024;

        // Tokens are validated against real time, so start the clock at "now".
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let blobs = BlobStore::new(uploads.path().to_path_buf()).await.unwrap();

        let state = AppStateInner::new(db, clock.clone(), config, blobs);
        Self {
            router: build_router(state),
            clock,
            _uploads: uploads,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Response { status, body, bytes }
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    /// Registers a user and returns (token, user id).
    pub async fn register(&self, email: &str, name: &str) -> (String, String) {
        let resp = self
            .call(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "email": email, "name": name, "password": "123456" })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "register {}: {}", email, resp.body);
        (
            resp.body["token"].as_str().unwrap().to_string(),
            resp.body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Two registered users linked as partners.
    pub async fn couple(&self) -> (String, String) {
        let (alex, _) = self.register("alex@example.com", "Alex").await;
        let (jamie, _) = self.register("jamie@example.com", "Jamie").await;
        let resp = self
            .call(
                "POST",
                "/partner/connect",
                Some(&alex),
                Some(json!({ "partner_email": "jamie@example.com" })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
        (alex, jamie)
    }
}
