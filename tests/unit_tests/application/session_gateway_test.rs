use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ragchat::application::ports::UserRepository;
use ragchat::application::services::{SessionError, SessionGateway, UserCredential};
use ragchat::infrastructure::persistence::InMemoryUserRepository;

use crate::helpers::{
    OTHER_PASSWORD, OTHER_USER, TEST_PASSWORD, TEST_USER, test_gateway, test_hasher,
    test_user_repository,
};

fn gateway() -> SessionGateway {
    test_gateway(chrono::Duration::hours(1))
}

#[tokio::test]
async fn given_valid_credentials_when_logging_in_then_opaque_hex_token_is_issued() {
    let gateway = gateway();

    let session = gateway.login(TEST_USER, TEST_PASSWORD).await.unwrap();

    assert_eq!(session.owner, TEST_USER);
    assert_eq!(session.token.as_str().len(), 64);
    assert!(session.token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    assert!(session.expires_at > session.created_at);
    assert_eq!(gateway.active_sessions().await, 1);
}

#[tokio::test]
async fn given_wrong_password_when_logging_in_then_invalid_credentials() {
    let gateway = gateway();

    let result = gateway.login(TEST_USER, "not-the-password").await;

    assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    assert_eq!(gateway.active_sessions().await, 0);
}

#[tokio::test]
async fn given_unknown_user_when_logging_in_then_invalid_credentials() {
    let result = gateway().login("mallory", TEST_PASSWORD).await;

    assert!(matches!(result, Err(SessionError::InvalidCredentials)));
}

#[tokio::test]
async fn given_issued_token_when_validating_then_session_owner_is_returned() {
    let gateway = gateway();
    let session = gateway.login(TEST_USER, TEST_PASSWORD).await.unwrap();

    let validated = gateway.validate(Some(session.token.as_str())).await.unwrap();

    assert_eq!(validated.owner, TEST_USER);
}

#[tokio::test]
async fn given_missing_or_unknown_token_when_validating_then_unauthorized() {
    let gateway = gateway();

    assert!(matches!(gateway.validate(None).await, Err(SessionError::Unauthorized)));
    assert!(matches!(gateway.validate(Some("")).await, Err(SessionError::Unauthorized)));
    assert!(matches!(
        gateway.validate(Some("deadbeef")).await,
        Err(SessionError::Unauthorized)
    ));
}

#[tokio::test]
async fn given_zero_ttl_when_validating_then_session_is_already_expired() {
    let gateway = test_gateway(chrono::Duration::zero());
    let session = gateway.login(TEST_USER, TEST_PASSWORD).await.unwrap();

    let result = gateway.validate(Some(session.token.as_str())).await;

    assert!(matches!(result, Err(SessionError::Unauthorized)));
    assert_eq!(gateway.active_sessions().await, 0);
}

#[tokio::test]
async fn given_abandoned_expired_session_when_next_login_happens_then_it_is_swept() {
    let gateway = test_gateway(chrono::Duration::milliseconds(50));
    let abandoned = gateway.login(TEST_USER, TEST_PASSWORD).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.tracked_sessions().await, 1);

    let fresh = gateway.login(OTHER_USER, OTHER_PASSWORD).await.unwrap();

    assert_eq!(gateway.tracked_sessions().await, 1);
    assert!(!gateway.logout(abandoned.token.as_str()).await);
    assert!(gateway.validate(Some(fresh.token.as_str())).await.is_ok());
}

#[tokio::test]
async fn given_live_session_when_logging_out_then_token_stops_working() {
    let gateway = gateway();
    let session = gateway.login(TEST_USER, TEST_PASSWORD).await.unwrap();

    assert!(gateway.logout(session.token.as_str()).await);
    assert!(!gateway.logout(session.token.as_str()).await);
    assert!(gateway.validate(Some(session.token.as_str())).await.is_err());
}

#[tokio::test]
async fn given_repeated_logins_when_issuing_tokens_then_each_is_unique() {
    let gateway = gateway();
    let mut tokens = HashSet::new();

    for _ in 0..20 {
        let session = gateway.login(TEST_USER, TEST_PASSWORD).await.unwrap();
        tokens.insert(session.token.as_str().to_string());
    }
    let other = gateway.login(OTHER_USER, OTHER_PASSWORD).await.unwrap();
    tokens.insert(other.token.as_str().to_string());

    assert_eq!(tokens.len(), 21);
    assert_eq!(gateway.active_sessions().await, 21);
}

#[tokio::test]
async fn given_new_username_when_registering_then_session_opens_and_login_works_later() {
    let users = test_user_repository();
    let gateway = SessionGateway::new(users.clone(), test_hasher(), chrono::Duration::hours(1));

    let session = gateway.register("  carol ", "s3cret").await.unwrap();

    assert_eq!(session.owner, "carol");
    assert!(gateway.validate(Some(session.token.as_str())).await.is_ok());
    let stored = users.find_user("carol").await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("pbkdf2-sha256$"));
    assert!(!stored.password_hash.contains("s3cret"));
    assert!(gateway.login("carol", "s3cret").await.is_ok());
    assert!(matches!(
        gateway.login("carol", "wrong").await,
        Err(SessionError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn given_taken_username_when_registering_then_rejected_and_password_unchanged() {
    let gateway = gateway();

    let result = gateway.register(TEST_USER, "another-password").await;

    assert!(matches!(result, Err(SessionError::UsernameTaken)));
    assert!(gateway.login(TEST_USER, TEST_PASSWORD).await.is_ok());
    assert!(gateway.login(TEST_USER, "another-password").await.is_err());
}

#[tokio::test]
async fn given_blank_username_or_password_when_registering_then_missing_credentials() {
    let gateway = gateway();

    assert!(matches!(
        gateway.register("   ", "password").await,
        Err(SessionError::MissingCredentials)
    ));
    assert!(matches!(
        gateway.register("dave", "").await,
        Err(SessionError::MissingCredentials)
    ));
    assert_eq!(gateway.tracked_sessions().await, 0);
}

#[tokio::test]
async fn given_configured_users_when_seeding_then_missing_ones_are_created_once() {
    let gateway = SessionGateway::new(
        Arc::new(InMemoryUserRepository::new()),
        test_hasher(),
        chrono::Duration::hours(1),
    );
    let credentials = vec![UserCredential {
        username: "demo".to_string(),
        password_hash: test_hasher().hash("changeme"),
    }];

    assert_eq!(gateway.seed(&credentials).await.unwrap(), 1);
    assert_eq!(gateway.seed(&credentials).await.unwrap(), 0);
    assert!(gateway.login("demo", "changeme").await.is_ok());
}

#[tokio::test]
async fn given_malformed_configured_hash_when_seeding_then_error_names_user() {
    let gateway = gateway();
    let credentials = vec![UserCredential {
        username: "broken".to_string(),
        password_hash: "plaintext".to_string(),
    }];

    let result = gateway.seed(&credentials).await;

    assert!(matches!(result, Err(SessionError::InvalidPasswordHash(name)) if name == "broken"));
}
