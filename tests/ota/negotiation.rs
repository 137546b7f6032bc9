use axum::http::StatusCode;
use serde_json::json;

use crate::support::*;

async fn check(
    env: &TestEnv,
    token: &str,
    device_type: &str,
    version: &str,
    build: i64,
) -> serde_json::Value {
    let auth = format!("Bearer {token}");
    let (status, body) = post_json(
        env,
        "/ota/check",
        &json!({
            "device_type": device_type,
            "current_version": version,
            "current_build": build,
        }),
        &[("authorization", auth.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "check failed: {body}");
    body
}

#[tokio::test]
async fn newer_stable_release_is_offered_with_delivery_metadata() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let release = seed_firmware(&env, "bridge", "1.1.0", 2, true, None, b"new firmware");

    let body = check(&env, &token, "bridge", "1.0.0", 1).await;
    assert_eq!(body["update_available"], true);
    assert_eq!(body["firmware_id"].as_i64(), Some(release.id));
    assert_eq!(body["version"], "1.1.0");
    assert_eq!(body["build_number"], 2);
    assert_eq!(body["file_hash"], release.file_hash);
    assert_eq!(body["file_size"].as_i64(), Some(release.file_size));
    // The download URL embeds a grant for this device.
    let url = body["download_url"].as_str().unwrap();
    assert!(url.starts_with(&format!("/ota/download/{}?grant=", release.id)));
}

#[tokio::test]
async fn up_to_date_device_gets_no_update() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    seed_firmware(&env, "bridge", "1.1.0", 2, true, None, b"fw");

    let body = check(&env, &token, "bridge", "1.1.0", 2).await;
    assert_eq!(body["update_available"], false);
    assert!(body.get("firmware_id").is_none());
}

#[tokio::test]
async fn min_current_version_gate_yields_no_update() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    seed_firmware(&env, "bridge", "2.0.0", 1, true, Some("1.5.0"), b"fw");

    let body = check(&env, &token, "bridge", "1.0.0", 1).await;
    assert_eq!(body["update_available"], false);
}

#[tokio::test]
async fn gated_newest_falls_back_to_the_stepping_stone() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let stepping_stone = seed_firmware(&env, "bridge", "1.5.0", 1, true, None, b"mid");
    let newest = seed_firmware(&env, "bridge", "2.0.0", 1, true, Some("1.5.0"), b"new");

    let body = check(&env, &token, "bridge", "1.0.0", 1).await;
    assert_eq!(body["firmware_id"].as_i64(), Some(stepping_stone.id));

    let body = check(&env, &token, "bridge", "1.5.0", 1).await;
    assert_eq!(body["firmware_id"].as_i64(), Some(newest.id));
}

#[tokio::test]
async fn deactivated_releases_are_never_offered() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let best = seed_firmware(&env, "bridge", "1.2.0", 1, true, None, b"best");
    let fallback = seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"ok");

    let (status, _) = delete_json(&env, &format!("/admin/firmware/{}", best.id), &admin()).await;
    assert_eq!(status, StatusCode::OK);

    let body = check(&env, &token, "bridge", "1.0.0", 1).await;
    assert_eq!(body["firmware_id"].as_i64(), Some(fallback.id));
}

#[tokio::test]
async fn unstable_releases_are_not_offered_automatically() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    seed_firmware(&env, "bridge", "2.0.0", 1, false, None, b"beta");

    let body = check(&env, &token, "bridge", "1.0.0", 1).await;
    assert_eq!(body["update_available"], false);
}

#[tokio::test]
async fn other_device_types_do_not_match() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    seed_firmware(&env, "display", "9.0.0", 1, true, None, b"fw");

    let body = check(&env, &token, "bridge", "1.0.0", 1).await;
    assert_eq!(body["update_available"], false);
}

#[tokio::test]
async fn unparseable_reported_version_yields_no_update() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    seed_firmware(&env, "bridge", "1.1.0", 1, true, None, b"fw");

    let body = check(&env, &token, "bridge", "not-a-version", 1).await;
    assert_eq!(body["update_available"], false);
}

#[tokio::test]
async fn check_requires_a_device_token() {
    let env = test_env();
    let (status, _) = post_json(
        &env,
        "/ota/check",
        &json!({"device_type": "bridge", "current_version": "1.0.0", "current_build": 1}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
