/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_api::{app::{build_router, AppState}, config::Config};
/// use taskboard_shared::db::pool::create_pool;
/// use taskboard_shared::store::PgStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// let pool = create_pool(&config.database)?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), None, config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::middleware::security::{security_headers, SecurityHeaders};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use taskboard_shared::lifecycle::TaskLifecycle;
use taskboard_shared::storage::{BackupExporter, BlobStore};
use taskboard_shared::store::TaskStore;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler via Axum's `State` extractor; every field is a
/// cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Task rules over the persistence handle
    pub lifecycle: TaskLifecycle,

    /// Snapshot writer; disabled when storage is not configured
    pub backups: BackupExporter,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    ///
    /// `blobs` holds both backup snapshots and task attachments; `None`
    /// disables both.
    pub fn new(
        store: Arc<dyn TaskStore>,
        blobs: Option<Arc<dyn BlobStore>>,
        config: Config,
    ) -> Self {
        let (lifecycle, backups) = match blobs {
            Some(blobs) => (
                TaskLifecycle::new(store).with_blobs(blobs.clone()),
                BackupExporter::new(blobs),
            ),
            None => (TaskLifecycle::new(store), BackupExporter::disabled()),
        };

        Self {
            lifecycle,
            backups,
            config: Arc::new(config),
        }
    }

    /// Persistence handle behind the lifecycle
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        self.lifecycle.store()
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /                         # HTML dashboard
/// ├── GET  /health                   # Liveness check
/// ├── POST /tasks                    # Create (form or JSON)
/// ├── POST /tasks/:id/start          # pending -> in-progress
/// ├── POST /tasks/:id/complete       # -> completed
/// ├── POST /tasks/:id/delete         # hard delete, attachments included
/// ├── POST /tasks/:id/attachments    # multipart upload
/// ├── POST /test-storage             # backup snapshot
/// └── /api/
///     ├── GET    /tasks              # newest first
///     ├── GET    /tasks/:id
///     ├── GET    /attachments/:id    # metadata
///     ├── GET    /categories
///     ├── POST   /categories
///     └── DELETE /categories/:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Response compression
/// 4. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let page_routes = Router::new()
        .route("/", get(routes::dashboard::dashboard))
        .route("/health", get(routes::health::health_check))
        .route("/test-storage", post(routes::backup::test_storage));

    let task_routes = Router::new()
        .route("/", post(routes::tasks::create_task))
        .route("/:id/start", post(routes::tasks::start_task))
        .route("/:id/complete", post(routes::tasks::complete_task))
        .route("/:id/delete", post(routes::tasks::delete_task))
        .route(
            "/:id/attachments",
            post(routes::tasks::upload_attachment)
                .layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes)),
        );

    let api_routes = Router::new()
        .route("/tasks", get(routes::api::list_tasks))
        .route("/tasks/:id", get(routes::api::get_task))
        .route("/attachments/:id", get(routes::api::get_attachment))
        .route(
            "/categories",
            get(routes::api::list_categories).post(routes::api::create_category),
        )
        .route("/categories/:id", delete(routes::api::delete_category));

    let cors = cors_layer(&state.config.api.cors_origins);
    let production = state.config.api.production;

    Router::new()
        .merge(page_routes)
        .nest("/tasks", task_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(from_fn_with_state(
            SecurityHeaders::new(production),
            security_headers,
        ))
        .with_state(state)
}

/// CORS policy: permissive when the allow-list contains `*`, otherwise only the
/// listed origins (entries that are not valid header values are skipped)
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}
