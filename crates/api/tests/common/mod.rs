#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use stemd_api::auth::jwt::{generate_token, JwtConfig};
use stemd_api::config::ServerConfig;
use stemd_api::routes;
use stemd_api::state::AppState;
use stemd_db::fallback::FallbackStore;
use stemd_db::registry::JobRegistry;
use stemd_engine::device::Device;
use stemd_engine::gate::DeviceGate;
use stemd_engine::runner::JobRunner;
use stemd_engine::separator::{Separator, SeparatorConfig};

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` rooted in the given work directory.
pub fn test_config(work: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        upload_dir: work.join("uploads"),
        output_dir: work.join("separated"),
        snapshot_dir: work.join("snapshots"),
        max_upload_size_mb: 25,
        avg_job_secs: 240,
        processing_remainder_secs: 60,
        gate_timeout_secs: None,
        cleanup_interval_secs: 86_400,
        retention_days: 7,
        // /bin/true exits cleanly without producing stems, so spawned
        // runners settle without touching a real separation tool.
        separator_binary: "/bin/true".to_string(),
        separator_model: "htdemucs".to_string(),
        separator_segment: 10,
        separator_shifts: 1,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            token_expiry_mins: 60,
        },
    }
}

/// A built application plus the temp directories backing it.
pub struct TestApp {
    pub app: Router,
    pub registry: JobRegistry,
    pub config: ServerConfig,
    pub upload_dir: PathBuf,
    _work: tempfile::TempDir,
}

/// Build the full application with all middleware layers, mirroring the
/// router construction in `main.rs` so integration tests exercise the
/// same stack that production uses.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, |_| {})
}

/// Same as [`build_test_app`] but lets the test tweak the config first.
pub fn build_test_app_with(
    pool: PgPool,
    customize: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let work = tempfile::tempdir().expect("tempdir");
    let mut config = test_config(work.path());
    customize(&mut config);

    std::fs::create_dir_all(&config.upload_dir).expect("upload dir");

    let fallback = FallbackStore::new(&config.snapshot_dir).expect("snapshot dir");
    let registry = JobRegistry::new(pool.clone(), fallback, config.retention_days);

    let separator = Separator::new(SeparatorConfig {
        binary: config.separator_binary.clone(),
        model: config.separator_model.clone(),
        device: Device::Cpu,
        segment: config.separator_segment,
        shifts: config.separator_shifts,
    });
    let gate = DeviceGate::new(config.gate_timeout_secs.map(Duration::from_secs));
    let runner = Arc::new(JobRunner::new(registry.clone(), gate, separator));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry: registry.clone(),
        runner,
        device: Device::Cpu,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::api_routes(&config))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    let upload_dir = config.upload_dir.clone();
    TestApp {
        app,
        registry,
        config,
        upload_dir,
        _work: work,
    }
}

/// Mint a valid token for `user_id` using the test secret.
pub fn auth_token(user_id: &str) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        token_expiry_mins: 60,
    };
    generate_token(user_id, &config).expect("token generation")
}

/// Send a GET request to the app.
pub async fn get(app: Router, path: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Send a GET request with a Bearer token.
pub async fn get_auth(app: Router, path: &str, token: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(path)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Send a POST request with a JSON body and optional Bearer token.
pub async fn post_json(
    app: Router,
    path: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(
        builder
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Send a POST with a single-file multipart body (field name `file`).
pub async fn post_multipart_file(
    app: Router,
    path: &str,
    filename: &str,
    bytes: &[u8],
) -> Response {
    let boundary = "test-boundary-7MA4YWxkTrZu0gW";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON body")
}
