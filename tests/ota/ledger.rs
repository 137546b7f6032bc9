use axum::http::StatusCode;
use serde_json::json;

use gatehouse::db::queries;
use gatehouse::models::UpdateStatus;

use crate::support::*;

async fn report(
    env: &TestEnv,
    token: &str,
    firmware_id: i64,
    status: &str,
    bytes: Option<i64>,
    error: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let auth = format!("Bearer {token}");
    let mut payload = json!({"firmware_id": firmware_id, "status": status});
    if let Some(bytes) = bytes {
        payload["bytes_downloaded"] = json!(bytes);
    }
    if let Some(error) = error {
        payload["error_message"] = json!(error);
    }
    post_json(env, "/ota/status", &payload, &[("authorization", auth.as_str())]).await
}

#[tokio::test]
async fn progress_reports_advance_one_attempt() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let release = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"fw");

    let (status, first) = report(&env, &token, release.id, "downloading", Some(512), None).await;
    assert_eq!(status, StatusCode::OK);
    let attempt_id = first["attempt_id"].as_i64().unwrap();

    let (status, second) =
        report(&env, &token, release.id, "installing", Some(2048), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["attempt_id"].as_i64(), Some(attempt_id));

    let (status, third) = report(&env, &token, release.id, "success", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["status"], "success");

    let conn = env.state.db.get().unwrap();
    let attempt = queries::get_attempt(&conn, attempt_id).unwrap().unwrap();
    assert_eq!(attempt.status, UpdateStatus::Success);
    assert_eq!(attempt.bytes_downloaded, 2048);
    assert!(attempt.download_started_at.is_some());
    assert!(attempt.download_completed_at.is_some());
    assert!(attempt.finished_at.is_some());
}

#[tokio::test]
async fn backward_reports_are_invalid_transitions() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let release = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"fw");

    report(&env, &token, release.id, "installing", None, None).await;

    let (status, body) = report(&env, &token, release.id, "pending", None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "invalid_transition");

    let (status, body) = report(&env, &token, release.id, "downloading", None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "invalid_transition");
}

#[tokio::test]
async fn a_retry_after_failure_opens_a_new_attempt() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let release = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"fw");

    let (_, first) = report(
        &env,
        &token,
        release.id,
        "failed",
        Some(100),
        Some("flash write error"),
    )
    .await;
    let first_id = first["attempt_id"].as_i64().unwrap();

    // The failed attempt is closed; a new report starts a fresh lifecycle.
    let (status, second) = report(&env, &token, release.id, "downloading", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let second_id = second["attempt_id"].as_i64().unwrap();
    assert_ne!(first_id, second_id);

    let conn = env.state.db.get().unwrap();
    let first_attempt = queries::get_attempt(&conn, first_id).unwrap().unwrap();
    assert_eq!(first_attempt.status, UpdateStatus::Failed);
    assert_eq!(first_attempt.error_message.as_deref(), Some("flash write error"));
}

#[tokio::test]
async fn phase_timestamps_are_stamped_once() {
    let env = test_env();
    let (tenant, _) = activated_device(&env, "acme", "scale-001").await;
    let release = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"fw");

    let mut conn = env.state.db.get().unwrap();
    let device = queries::get_device(&conn, &tenant.id, "scale-001")
        .unwrap()
        .unwrap();
    let attempt = queries::open_attempt(&conn, &device.id, release.id, 1_000).unwrap();

    let after_first = queries::advance_attempt(
        &mut conn,
        attempt.id,
        UpdateStatus::Downloading,
        Some(10),
        None,
        2_000,
    )
    .unwrap();
    assert_eq!(after_first.download_started_at, Some(2_000));

    // A later progress report in the same phase keeps the original stamp.
    let after_second = queries::advance_attempt(
        &mut conn,
        attempt.id,
        UpdateStatus::Downloading,
        Some(20),
        None,
        3_000,
    )
    .unwrap();
    assert_eq!(after_second.download_started_at, Some(2_000));
    assert_eq!(after_second.bytes_downloaded, 20);
}

#[tokio::test]
async fn terminal_attempts_admit_no_transition() {
    let env = test_env();
    let (tenant, _) = activated_device(&env, "acme", "scale-001").await;
    let release = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"fw");

    let mut conn = env.state.db.get().unwrap();
    let device = queries::get_device(&conn, &tenant.id, "scale-001")
        .unwrap()
        .unwrap();
    let attempt = queries::open_attempt(&conn, &device.id, release.id, 1_000).unwrap();
    queries::advance_attempt(&mut conn, attempt.id, UpdateStatus::Success, None, None, 2_000)
        .unwrap();

    for next in [
        UpdateStatus::Pending,
        UpdateStatus::Downloading,
        UpdateStatus::Installing,
        UpdateStatus::Success,
        UpdateStatus::Failed,
    ] {
        let err =
            queries::advance_attempt(&mut conn, attempt.id, next, None, None, 3_000).unwrap_err();
        assert!(matches!(
            err,
            gatehouse::error::AppError::InvalidTransition(_)
        ));
    }
}

#[tokio::test]
async fn ledger_queries_filter_and_order_newest_first() {
    let env = test_env();
    let (tenant, token) = activated_device(&env, "acme", "scale-001").await;
    let first = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"a");
    let second = seed_firmware(&env, "bridge", "1.2.0", 1, true, None, b"b");

    report(&env, &token, first.id, "failed", None, Some("timeout")).await;
    report(&env, &token, second.id, "success", None, None).await;

    let (status, body) = get_json(&env, "/admin/attempts", &admin()).await;
    assert_eq!(status, StatusCode::OK);
    let attempts = body.as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    // Newest first.
    assert_eq!(attempts[0]["firmware_id"].as_i64(), Some(second.id));

    let (_, body) = get_json(&env, "/admin/attempts?status=failed", &admin()).await;
    let attempts = body.as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["firmware_id"].as_i64(), Some(first.id));

    let device_row = {
        let conn = env.state.db.get().unwrap();
        queries::get_device(&conn, &tenant.id, "scale-001")
            .unwrap()
            .unwrap()
            .id
    };
    let (_, body) = get_json(
        &env,
        &format!("/admin/attempts?device_id={device_row}&firmware_id={}", second.id),
        &admin(),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn status_reports_require_a_known_firmware() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;

    let (status, body) = report(&env, &token, 9999, "downloading", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
}
