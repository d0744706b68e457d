//! Tests for secret rotation and concurrent reloads

mod common;

use common::*;
use sesame::{Settings, TokenError};
use std::thread;

const NEW_SECRET: &str = "rotated-test-secret";

fn rotated() -> Settings {
    settings()
        .with_secret_key(NEW_SECRET)
        .with_secret_key_fallbacks(vec![SECRET.to_string()])
}

#[test]
fn test_token_survives_rotation() {
    let (sesame, _) = service(settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");

    reload(&sesame, rotated());
    assert_eq!(
        sesame.verify_token(&token, store.lookup(), "", None).expect("fallback key"),
        john()
    );

    // New tokens are signed with the new secret.
    let new_token = sesame.create_token(&john(), "").expect("token");
    assert_ne!(new_token, token);
    reload(&sesame, settings().with_secret_key(NEW_SECRET));
    assert!(sesame.parse_token(&new_token, store.lookup(), "", None).is_some());
}

#[test]
fn test_token_revoked_when_fallback_removed() {
    let (sesame, _) = service(settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");

    reload(&sesame, settings().with_secret_key(NEW_SECRET));
    let (user, logs) = capture_logs(|| sesame.verify_token(&token, store.lookup(), "", None));
    assert!(matches!(user, Err(TokenError::InvalidToken)));
    logs.assert_contains("Invalid token for user 1 in default scope");
}

#[test]
fn test_scoped_token_survives_rotation() {
    let (sesame, _) = service(settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "test").expect("token");

    reload(&sesame, rotated());
    assert!(sesame.parse_token(&token, store.lookup(), "test", None).is_some());
}

#[test]
fn test_verification_during_reloads() {
    let (sesame, _) = service(settings());
    let store = MemoryStore::with_users([john()]);
    let token = sesame.create_token(&john(), "").expect("token");

    thread::scope(|s| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    (0..50)
                        .filter(|_| sesame.parse_token(&token, store.lookup(), "", None).is_some())
                        .count()
                })
            })
            .collect();

        s.spawn(|| {
            for i in 0..20 {
                let next = if i % 2 == 0 { rotated() } else { settings() };
                reload(&sesame, next);
            }
        });

        for reader in readers {
            assert_eq!(reader.join().expect("reader thread"), 50);
        }
    });
}
