use gatehouse::crypto;
use gatehouse::db::queries;

use crate::support::*;

#[tokio::test]
async fn issuing_demotes_the_previous_current_secret() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let mut conn = env.state.db.get().unwrap();

    let (first, _) =
        queries::issue_license_secret(&mut conn, &tenant.id, &env.state.keyring).unwrap();
    let (second, _) =
        queries::issue_license_secret(&mut conn, &tenant.id, &env.state.keyring).unwrap();

    let secrets = queries::list_secrets_for_tenant(&conn, &tenant.id).unwrap();
    assert_eq!(secrets.len(), 2);
    let current: Vec<_> = secrets.iter().filter(|s| s.current).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, second.id);
    assert!(secrets.iter().any(|s| s.id == first.id && !s.current));
}

#[tokio::test]
async fn plaintext_verifies_against_the_stored_hash_only() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let mut conn = env.state.db.get().unwrap();

    let (stored, plaintext) =
        queries::issue_license_secret(&mut conn, &tenant.id, &env.state.keyring).unwrap();

    assert_ne!(stored.secret_hash, plaintext);
    assert!(crypto::verify_secret(&plaintext, &stored.secret_hash));
    assert!(!crypto::verify_secret("gh_guess", &stored.secret_hash));
    // The fingerprint is a lookup aid, not a second hash of record.
    assert_eq!(stored.fingerprint, env.state.keyring.fingerprint(&plaintext));
}

#[tokio::test]
async fn revoked_secrets_stop_being_current() {
    let env = test_env();
    let tenant = seed_tenant(&env, "acme");
    let mut conn = env.state.db.get().unwrap();

    let (secret, _) =
        queries::issue_license_secret(&mut conn, &tenant.id, &env.state.keyring).unwrap();
    assert!(queries::revoke_license_secret(&conn, &secret.id).unwrap());

    assert!(queries::get_current_secret(&conn, &tenant.id).unwrap().is_none());
    // Revoking twice is a no-op.
    assert!(!queries::revoke_license_secret(&conn, &secret.id).unwrap());
}
