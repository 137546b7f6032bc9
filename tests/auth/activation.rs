use axum::http::StatusCode;
use serde_json::json;

use gatehouse::db::queries;

use crate::support::*;

#[tokio::test]
async fn activation_issues_a_token_bound_to_the_device() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let secret = seed_secret(&env, &tenant.id);

    let token = activate(&env, "acme", &secret, "scale-001").await;

    // Validating the token immediately yields the same binding.
    let claims = env.state.tokens.verify(&token, queries::now()).unwrap();
    assert_eq!(claims.tenant_id, tenant.id);
    assert_eq!(claims.device_id, "scale-001");
    assert_eq!(claims.expires_at - claims.issued_at, 7 * DAY);

    let conn = env.state.db.get().unwrap();
    let device = queries::get_device(&conn, &tenant.id, "scale-001")
        .unwrap()
        .expect("device bound on first activation");
    assert!(!device.revoked);
}

#[tokio::test]
async fn company_code_lookup_is_case_insensitive() {
    let env = test_env();
    let tenant = seed_tenant(&env, "Acme");
    let secret = seed_secret(&env, &tenant.id);

    activate(&env, "ACME", &secret, "scale-001").await;
}

#[tokio::test]
async fn reactivation_is_idempotent() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let secret = seed_secret(&env, &tenant.id);

    let first = activate(&env, "acme", &secret, "scale-001").await;
    let second = activate(&env, "acme", &secret, "scale-001").await;

    let now = queries::now();
    assert!(env.state.tokens.verify(&first, now).is_ok());
    assert!(env.state.tokens.verify(&second, now).is_ok());

    // Still exactly one binding.
    let conn = env.state.db.get().unwrap();
    let devices = queries::list_devices_for_tenant(&conn, &tenant.id).unwrap();
    assert_eq!(devices.len(), 1);
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let env = test_env();
    let (status, body) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "ghost", "license_key": "gh_x", "device_id": "d"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    seed_secret(&env, &tenant.id);

    let (status, body) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "acme", "license_key": "gh_wrong", "device_id": "d"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "invalid_credential");
}

#[tokio::test]
async fn suspended_tenant_cannot_activate() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let secret = seed_secret(&env, &tenant.id);

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

    let (status, body) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "acme", "license_key": secret, "device_id": "d"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "suspended");
}

#[tokio::test]
async fn lapsed_subscription_cannot_activate() {
    let env = test_env();
    let tenant = seed_tenant_with_expiry(&env, "acme", queries::now() - DAY);
    let secret = seed_secret(&env, &tenant.id);

    let (status, body) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "acme", "license_key": secret, "device_id": "d"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "suspended");
}

#[tokio::test]
async fn rotation_demotes_the_previous_secret() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let old_secret = seed_secret(&env, &tenant.id);
    let new_secret = seed_secret(&env, &tenant.id);

    // The rotated-out secret no longer activates anything.
    let (status, body) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "acme", "license_key": old_secret, "device_id": "d1"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "invalid_credential");

    activate(&env, "acme", &new_secret, "d2").await;
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let secret = seed_secret(&env, &tenant.id);

    let (status, _) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "acme", "license_key": secret, "device_id": "  "}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &env,
        "/activate",
        &json!({"company_code": "acme", "license_key": "", "device_id": "d"}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "invalid_credential");
}
