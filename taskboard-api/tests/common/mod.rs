/// Common test utilities for integration tests
///
/// Builds the real router over an in-memory task store (seeded with the
/// default categories) and, optionally, an in-memory blob store, then drives
/// it through `tower::Service::call`.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use std::sync::Arc;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::storage::{BlobStore, MemoryBlobStore};
use taskboard_shared::store::MemoryStore;
use tower::Service as _;

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub blobs: Option<Arc<MemoryBlobStore>>,
    pub app: axum::Router,
}

/// Status, headers and body of one response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "Expected JSON body ({}), got {}: {}",
                e,
                self.status,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// One multipart field
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Part {
            name: "file",
            filename: Some(filename),
            content_type,
            data,
        }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Part {
            name,
            filename: None,
            content_type: "text/plain",
            data: value.as_bytes(),
        }
    }
}

/// Default configuration, no file or environment involved
pub fn test_config() -> Config {
    let settings = config::Config::builder().build().unwrap();
    Config::from_settings(settings).unwrap()
}

impl TestContext {
    /// Router with backups disabled
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Router with backups going to an in-memory blob store
    pub fn with_storage() -> Self {
        Self::build(Some(Arc::new(MemoryBlobStore::new())))
    }

    fn build(blobs: Option<Arc<MemoryBlobStore>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared = blobs.clone().map(|b| b as Arc<dyn BlobStore>);

        let state = AppState::new(store.clone(), shared, test_config());
        let app = build_router(state);

        TestContext { store, blobs, app }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().call(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POST with a JSON body, asking for a JSON answer
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST without a body, asking for a JSON answer
    pub async fn post_action_json(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST the way a browser submits a dashboard form
    pub async fn post_form(&self, uri: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::ACCEPT, "text/html")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST a `multipart/form-data` body; `json` picks the Accept header
    pub async fn post_multipart(&self, uri: &str, parts: &[Part<'_>], json: bool) -> TestResponse {
        const BOUNDARY: &str = "taskboard-test-boundary";

        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part.filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        part.name, filename, part.content_type
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                ),
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .header(
                    header::ACCEPT,
                    if json { "application/json" } else { "text/html" },
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Creates a task through the JSON API and returns its id
    pub async fn create_task(&self, body: serde_json::Value) -> i64 {
        let response = self.post_json("/tasks", body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["id"].as_i64().unwrap()
    }

    /// Ids from `GET /api/tasks`, in listing order
    pub async fn api_task_ids(&self) -> Vec<i64> {
        self.get("/api/tasks").await.json()["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_i64().unwrap())
            .collect()
    }
}
