//! Tests for v1 tokens

mod common;

use chrono::Duration;
use common::*;
use sesame::tokens::v1::detect_token;
use sesame::{BadTokenReason, PrimaryKey, Settings, TokenError, TokenVersion};

fn v1_settings() -> Settings {
    settings().with_tokens(vec![TokenVersion::V1])
}

#[test]
fn test_valid_token() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    assert!(detect_token(&sesame.config(), &token));

    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert_eq!(user.expect("valid token"), john());
    logs.assert_contains("Valid token for user 1");
}

#[test]
fn test_exact_token() {
    let (sesame, _) = service(v1_settings());
    assert_eq!(
        sesame.create_token(&john(), "").expect("token"),
        "AAAAAUF459daIhtwsjwDy6S_nuk:yG-S5s7THLa9a1TIMemCRjTeHPE"
    );
}

#[test]
fn test_exact_token_with_timestamp() {
    let (sesame, _) = service(v1_settings().with_max_age_secs(300));
    let token = sesame.create_token(&john(), "").expect("token");
    assert_eq!(
        token,
        "AAAAAUF459daIhtwsjwDy6S_nuk:1rK5iq:6w70doiqD2PJlbGy5PFkJf5rdB0"
    );
    assert!(detect_token(&sesame.config(), &token));
}

#[test]
fn test_payload_layout() {
    let (sesame, _) = service(v1_settings());
    let token = sesame.create_token(&john(), "").expect("token");
    let (payload, signature) = token.split_once(':').expect("separator");
    let data = decode_token(payload);
    // Packed primary key followed by an MD5-sized revocation key.
    assert_eq!(data.len(), 4 + 16);
    assert_eq!(&data[..4], &[0, 0, 0, 1]);
    assert_eq!(signature.len(), 27);
}

// Invalid tokens

#[test]
fn test_bad_signature() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    let token = alter_char(&token, token.len() - 5);
    assert!(detect_token(&sesame.config(), &token));

    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert!(matches!(
        user,
        Err(TokenError::BadToken(BadTokenReason::BadSignature))
    ));
    logs.assert_contains("Bad token: bad signature");
}

#[test]
fn test_tampered_payload() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john(), jane()]);
    let token = sesame.create_token(&john(), "").expect("token");
    let token = alter_char(&token, 4);
    assert!(matches!(
        sesame.verify_token(&token, store.lookup(), "", None),
        Err(TokenError::BadToken(BadTokenReason::BadSignature))
    ));
}

#[test]
fn test_detection_depends_on_max_age() {
    let (plain, _) = service(v1_settings());
    let (timestamped, _) = service(v1_settings().with_max_age_secs(300));
    let token = plain.create_token(&john(), "").expect("token");
    let timestamped_token = timestamped.create_token(&john(), "").expect("token");

    assert!(detect_token(&plain.config(), &token));
    assert!(!detect_token(&timestamped.config(), &token));
    assert!(detect_token(&timestamped.config(), &timestamped_token));
    assert!(!detect_token(&plain.config(), &timestamped_token));
    assert!(!detect_token(&plain.config(), "AAAAAYa-ybY45ZU_UIg"));
}

#[test]
fn test_unknown_user() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    store.delete(&PrimaryKey::Int(1));

    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert!(matches!(user, Err(TokenError::UnknownOrInactiveUser)));
    logs.assert_contains("Unknown or inactive user: pk = 1");
}

#[test]
fn test_inactive_user() {
    let (sesame, _) = service(v1_settings());
    let token = sesame.create_token(&john(), "").expect("token");
    let inactive = TestUser {
        active: false,
        ..john()
    };

    let (user, logs) =
        capture_logs(|| sesame.verify_token(&token, |_: &PrimaryKey| Some(inactive), "", None));
    assert!(matches!(user, Err(TokenError::UnknownOrInactiveUser)));
    logs.assert_contains("Unknown or inactive user: pk = 1");
}

#[test]
fn test_invalid_token_after_password_change() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    store.save(TestUser {
        password: Some("pbkdf2_sha256$600000$c2FsdA$aHVudGVyMg".to_string()),
        ..john()
    });

    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert!(matches!(user, Err(TokenError::InvalidToken)));
    logs.assert_contains("Invalid token for user 1");
}

#[test]
fn test_one_time_token_invalidation() {
    let (sesame, _) = service(v1_settings().with_one_time(true));
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    assert!(sesame.parse_token(&token, store.lookup(), "", None).is_some());

    store.save(TestUser {
        last_login: chrono::DateTime::from_timestamp(NOW, 0),
        ..john()
    });
    assert!(matches!(
        sesame.verify_token(&token, store.lookup(), "", None),
        Err(TokenError::InvalidToken)
    ));
}

// Token expiry

#[test]
fn test_valid_max_age_token() {
    let (sesame, clock) = service(v1_settings().with_max_age_secs(300));
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    clock.advance(Duration::seconds(299));
    assert!(sesame.parse_token(&token, store.lookup(), "", None).is_some());
}

#[test]
fn test_expired_max_age_token() {
    let (sesame, clock) = service(v1_settings().with_max_age_secs(300));
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    clock.advance(Duration::seconds(301));

    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert!(matches!(
        user,
        Err(TokenError::ExpiredToken { age }) if age == Duration::seconds(301)
    ));
    logs.assert_contains("Expired token: age = 301 seconds");
}

#[test]
fn test_max_age_argument_overrides_setting() {
    let (sesame, clock) = service(v1_settings().with_max_age_secs(300));
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");
    clock.advance(Duration::seconds(400));

    assert!(sesame
        .verify_token(&token, store.lookup(), "", Some(Duration::seconds(600)))
        .is_ok());
    assert!(matches!(
        sesame.verify_token(&token, store.lookup(), "", None),
        Err(TokenError::ExpiredToken { .. })
    ));
}

#[test]
fn test_max_age_argument_ignored_without_max_age() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");

    let (user, logs) = capture_logs(|| {
        sesame.verify_token(&token, store.lookup(), "", Some(Duration::seconds(-1)))
    });
    assert!(user.is_ok());
    logs.assert_contains("Ignoring max_age argument");
}

// Unsupported features and stale configuration

#[test]
fn test_scope_is_not_supported() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    assert!(matches!(
        sesame.create_token(&john(), "test"),
        Err(TokenError::ScopeNotSupported)
    ));

    let token = sesame.create_token(&john(), "").expect("token");
    let (user, logs) =
        capture_logs(|| sesame.verify_token(&token, store.lookup(), "test", None));
    assert!(matches!(user, Err(TokenError::ScopeNotSupported)));
    assert!(user.is_err_and(|err| err.is_usage_error()));
    logs.assert_contains("v1 tokens don't support scope");

    // parse_token folds the usage error into None after logging it.
    let (user, logs) =
        capture_logs(|| sesame.parse_token(&token, store.lookup(), "test", None));
    assert_eq!(user, None);
    logs.assert_contains("v1 tokens don't support scope");
}

#[test]
fn test_custom_packer_change() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");

    // v1 signatures don't depend on the packer; the payload no longer parses.
    reload(&sesame, v1_settings().with_packer("repeat"));
    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert!(matches!(
        user,
        Err(TokenError::BadToken(BadTokenReason::UnexpectedPrimaryKey))
    ));
    logs.assert_contains("you must regenerate tokens");
}

#[test]
fn test_secret_rotation() {
    let (sesame, _) = service(v1_settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");

    reload(
        &sesame,
        v1_settings()
            .with_secret_key("new-secret")
            .with_secret_key_fallbacks(vec![SECRET.to_string()]),
    );
    assert!(sesame.parse_token(&token, store.lookup(), "", None).is_some());
    assert_ne!(sesame.create_token(&john(), "").expect("token"), token);

    reload(&sesame, v1_settings().with_secret_key("new-secret"));
    assert!(matches!(
        sesame.verify_token(&token, store.lookup(), "", None),
        Err(TokenError::BadToken(BadTokenReason::BadSignature))
    ));
}
