use axum::http::StatusCode;
use serde_json::json;

use gatehouse::db::queries;
use gatehouse::error::AppError;

use crate::support::*;

/// Flip one character of the signature segment.
fn tamper(token: &str) -> String {
    let mut tampered = token.to_string();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    tampered
}

#[tokio::test]
async fn tampered_tokens_are_rejected_everywhere() {
    let env = test_env();
    let (_, token) = activated_device(&env, "acme", "scale-001").await;
    let forged = tamper(&token);

    let err = env.state.tokens.verify(&forged, queries::now()).unwrap_err();
    assert!(matches!(err, AppError::Tampered));

    let auth = format!("Bearer {forged}");
    let (status, body) = post_json(
        &env,
        "/ota/check",
        &json!({"device_type": "bridge", "current_version": "1.0.0", "current_build": 1}),
        &[("authorization", auth.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "tampered");

    let (status, body) = post_json(&env, "/refresh", &json!({}), &[("authorization", auth.as_str())])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "tampered");
}

#[tokio::test]
async fn refresh_returns_a_fresh_window() {
    let env = test_env();
    let (tenant, token) = activated_device(&env, "acme", "scale-001").await;

    let auth = format!("Bearer {token}");
    let (status, body) = post_json(&env, "/refresh", &json!({}), &[("authorization", auth.as_str())])
        .await;
    assert_eq!(status, StatusCode::OK);

    let new_token = body["access_token"].as_str().unwrap();
    let issued_at = body["issued_at"].as_i64().unwrap();
    let expires_at = body["expires_at"].as_i64().unwrap();
    assert_eq!(expires_at - issued_at, 7 * DAY);

    let claims = env.state.tokens.verify(new_token, queries::now()).unwrap();
    assert_eq!(claims.tenant_id, tenant.id);
    assert_eq!(claims.device_id, "scale-001");
}

#[tokio::test]
async fn refresh_requires_a_bearer_token() {
    let env = test_env();
    let (status, body) = post_json(&env, "/refresh", &json!({}), &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "unauthorized");
}

#[tokio::test]
async fn refresh_fails_once_the_subscription_lapses() {
    let env = test_env();
    let (tenant, token) = activated_device(&env, "acme", "scale-001").await;

    {
        let conn = env.state.db.get().unwrap();
        queries::update_tenant(
            &conn,
            &tenant.id,
            &gatehouse::models::UpdateTenant {
                subscription_expires_at: Some(queries::now() - DAY),
                ..Default::default()
            },
            &env.state.keyring,
        )
        .unwrap();
    }

    let auth = format!("Bearer {token}");
    let (status, body) = post_json(&env, "/refresh", &json!({}), &[("authorization", auth.as_str())])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "suspended");
}

#[tokio::test]
async fn validation_rechecks_live_tenant_state() {
    let env = test_env();
    let (tenant, token) = activated_device(&env, "acme", "scale-001").await;

    // Token is fine, but the tenant got suspended after issuance.
    {
        let conn = env.state.db.get().unwrap();
        queries::update_tenant(
            &conn,
            &tenant.id,
            &gatehouse::models::UpdateTenant {
                status: Some(gatehouse::models::TenantStatus::Suspended),
                ..Default::default()
            },
            &env.state.keyring,
        )
        .unwrap();
    }

    let auth = format!("Bearer {token}");
    let (status, body) = post_json(
        &env,
        "/ota/check",
        &json!({"device_type": "bridge", "current_version": "1.0.0", "current_build": 1}),
        &[("authorization", auth.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "suspended");
}
