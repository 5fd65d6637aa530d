//! Integration tests for job submission, status, and listing.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router.
//! Jobs are seeded through the registry where a specific lifecycle state
//! is needed, so tests stay free of timing on the background runner.

mod common;

use axum::http::StatusCode;
use common::{auth_token, body_json, build_test_app, get, get_auth, post_json};
use serde_json::json;
use sqlx::PgPool;
use stemd_db::models::job::{JobUpdate, NewJob};
use stemd_db::models::status::JobStatus;
use uuid::Uuid;

/// Write a small fake audio file into the app's upload directory and
/// return its full path.
fn seed_upload(harness: &common::TestApp, size_bytes: usize) -> String {
    let path = harness.upload_dir.join(format!("{}.mp3", Uuid::new_v4()));
    std::fs::write(&path, vec![0u8; size_bytes]).unwrap();
    path.to_string_lossy().into_owned()
}

fn new_job(user_id: &str) -> NewJob {
    NewJob {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        input_path: "/uploads/track.mp3".to_string(),
        output_dir: "/separated".to_string(),
        stems: 2,
        original_filename: Some("track.mp3".to_string()),
        file_size: Some(1024),
        ip_address: None,
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_returns_202_with_job_id(pool: PgPool) {
    let harness = build_test_app(pool);
    let input_path = seed_upload(&harness, 1024);
    let token = auth_token("user_1");

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path, "stems": 2 }),
        Some(&token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let job_id: Uuid = json["job_id"].as_str().unwrap().parse().unwrap();

    let job = harness.registry.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.user_id, "user_1");
    assert_eq!(job.stems, 2);
    assert_eq!(job.input_path, input_path);
    assert_eq!(job.file_size, Some(1024));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_missing_input_returns_400(pool: PgPool) {
    let harness = build_test_app(pool);

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": "/nonexistent/track.mp3" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_with_invalid_stems_returns_400(pool: PgPool) {
    let harness = build_test_app(pool);
    let input_path = seed_upload(&harness, 1024);

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path, "stems": 9 }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_with_invalid_token_returns_401(pool: PgPool) {
    let harness = build_test_app(pool);
    let input_path = seed_upload(&harness, 1024);

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path }),
        Some("not-a-real-token"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Quota enforcement
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_at_hourly_limit_returns_429(pool: PgPool) {
    let harness = build_test_app(pool.clone());
    let input_path = seed_upload(&harness, 1024);
    let token = auth_token("user_1");

    // Seed a quota row already at the hourly limit.
    sqlx::query("INSERT INTO user_quotas (user_id, jobs_last_hour) VALUES ($1, 5)")
        .bind("user_1")
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path }),
        Some(&token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["code"], "HOURLY_LIMIT");

    // The rejected submission created no job and consumed no quota.
    let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(jobs, 0);

    let used: i32 =
        sqlx::query_scalar("SELECT jobs_last_hour FROM user_quotas WHERE user_id = $1")
            .bind("user_1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(used, 5);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_at_daily_limit_returns_429(pool: PgPool) {
    let harness = build_test_app(pool.clone());
    let input_path = seed_upload(&harness, 1024);
    let token = auth_token("user_1");

    sqlx::query("INSERT INTO user_quotas (user_id, jobs_last_day) VALUES ($1, 20)")
        .bind("user_1")
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path }),
        Some(&token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["code"], "DAILY_LIMIT");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn submit_oversized_file_returns_413(pool: PgPool) {
    let harness = build_test_app(pool.clone());
    let input_path = seed_upload(&harness, 1024);
    let token = auth_token("user_1");

    // A per-user cap of 0 MB rejects any non-empty file.
    sqlx::query("INSERT INTO user_quotas (user_id, max_file_size_mb) VALUES ($1, 0)")
        .bind("user_1")
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path }),
        Some(&token),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FILE_TOO_LARGE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn quota_identities_are_independent(pool: PgPool) {
    let harness = build_test_app(pool.clone());
    let input_path = seed_upload(&harness, 1024);

    // user_a is exhausted; user_b is untouched.
    sqlx::query("INSERT INTO user_quotas (user_id, jobs_last_hour) VALUES ($1, 5)")
        .bind("user_a")
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(
        harness.app.clone(),
        "/separate",
        json!({ "input_path": input_path }),
        Some(&auth_token("user_a")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = post_json(
        harness.app,
        "/separate",
        json!({ "input_path": input_path }),
        Some(&auth_token("user_b")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn status_unknown_job_returns_404(pool: PgPool) {
    let harness = build_test_app(pool);
    let response = get(harness.app, &format!("/status/{}", Uuid::new_v4())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn queued_status_includes_queue_estimate(pool: PgPool) {
    let harness = build_test_app(pool);
    let job = harness.registry.create(&new_job("user_1")).await.unwrap();

    let response = get(harness.app, &format!("/status/{}", job.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "queued");
    assert_eq!(json["progress"], 0);
    assert!(json.get("stems").is_none());

    // The queued count includes the job itself; the wait estimate is one
    // average job with nothing on the device.
    let queue = &json["queue"];
    assert_eq!(queue["jobsAhead"], 1);
    assert_eq!(queue["currentlyProcessing"], false);
    assert_eq!(queue["position"], 1);
    assert_eq!(queue["estimatedWaitSeconds"], 240);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn completed_status_includes_stems_and_no_queue(pool: PgPool) {
    let harness = build_test_app(pool);
    let job = harness.registry.create(&new_job("user_1")).await.unwrap();
    harness
        .registry
        .update(
            job.id,
            &JobUpdate {
                status: Some(JobStatus::Completed),
                progress: Some(100),
                stem_files: Some(json!({
                    "vocals": "/separated/htdemucs/track/vocals.wav",
                    "no_vocals": "/separated/htdemucs/track/no_vocals.wav",
                })),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let response = get(harness.app, &format!("/status/{}", job.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["progress"], 100);
    assert!(json.get("queue").is_none());
    assert_eq!(
        json["stems"]["vocals"],
        "/separated/htdemucs/track/vocals.wav"
    );
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn list_jobs_is_scoped_to_the_caller(pool: PgPool) {
    let harness = build_test_app(pool);

    for user in ["user_a", "user_a", "user_b"] {
        harness.registry.create(&new_job(user)).await.unwrap();
    }

    let token = auth_token("user_a");
    let response = get_auth(harness.app.clone(), "/jobs", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    // An anonymous caller owns no jobs.
    let response = get(harness.app, "/jobs").await;
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}
