//! Auth façade tests against a local mock server

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use cervantes_client::{
    AuthService, AuthState, AuthTokens, Error, MemoryTokenStorage, TokenStorage,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{fast_config, jwt, token_pair_body};

const STORAGE_KEY: &str = "cervantes_auth_tokens";

async fn service(server: &MockServer) -> AuthService {
    AuthService::new(fast_config(&server.uri())).await.unwrap()
}

#[tokio::test]
async fn login_stores_the_issued_pair() {
    let access = jwt(600);
    let refresh = jwt(30 * 24 * 3600);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(serde_json::json!({
            "email": "reader@example.com",
            "password": "correct horse battery"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_pair_body(&access, &refresh)))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryTokenStorage::new());
    let auth = AuthService::with_storage(fast_config(&server.uri()), storage.clone())
        .await
        .unwrap();

    let tokens = auth
        .login("reader@example.com", "correct horse battery")
        .await
        .unwrap();

    assert_eq!(tokens, AuthTokens::new(access.clone(), refresh));
    assert!(auth.is_authenticated());
    assert_eq!(auth.access_token(), Some(access));
    assert!(!auth.token_manager().needs_refresh());
    assert!(storage.get_item(STORAGE_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn login_rejects_bad_credentials_without_a_network_call() {
    let server = MockServer::start().await;
    let auth = service(&server).await;

    assert_matches!(
        auth.login("not-an-email", "longenough").await.unwrap_err(),
        Error::Validation { .. }
    );
    assert_matches!(
        auth.login("reader@example.com", "short").await.unwrap_err(),
        Error::Validation { .. }
    );
    assert!(!auth.is_authenticated());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_login_leaves_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "wrong password"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    let err = auth
        .login("reader@example.com", "wrong password")
        .await
        .unwrap_err();

    assert_matches!(err, Error::Authentication { status: 401, .. });
    assert!(!auth.is_authenticated());
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn signup_posts_the_registration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup"))
        .and(body_json(serde_json::json!({
            "email": "reader@example.com",
            "password": "correct horse battery",
            "username": "reader"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "u1" })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    auth.signup("reader@example.com", "correct horse battery", "reader")
        .await
        .unwrap();
}

#[tokio::test]
async fn signup_requires_a_username() {
    let server = MockServer::start().await;
    let auth = service(&server).await;

    let err = auth
        .signup("reader@example.com", "correct horse battery", "  ")
        .await
        .unwrap_err();

    assert_matches!(err, Error::Validation { .. });
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn logout_tells_the_server_then_clears_the_session() {
    let refresh = jwt(3600);
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(body_json(serde_json::json!({ "refresh": refresh })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    auth.token_manager()
        .set_tokens(AuthTokens::new(jwt(600), refresh))
        .await
        .unwrap();

    auth.logout().await.unwrap();

    assert!(!auth.is_authenticated());
    assert_eq!(auth.token_manager().state(), AuthState::Unauthenticated);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn logout_keeps_the_session_when_the_server_call_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    let tokens = AuthTokens::new(jwt(600), jwt(3600));
    auth.token_manager().set_tokens(tokens.clone()).await.unwrap();

    let err = auth.logout().await.unwrap_err();

    assert_matches!(err, Error::Server { status: 500, .. });
    assert!(auth.is_authenticated());
    assert_eq!(auth.token_manager().tokens(), Some(tokens));
}

#[tokio::test]
async fn logout_without_a_session_fails_fast() {
    let server = MockServer::start().await;
    let auth = service(&server).await;

    assert_matches!(auth.logout().await.unwrap_err(), Error::NotAuthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_refreshes_hit_the_endpoint_once() {
    let old_refresh = jwt(3600);
    let new_access = jwt(600);
    let new_refresh = jwt(7200);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({ "refresh": old_refresh })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_pair_body(&new_access, &new_refresh)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    auth.token_manager()
        .set_tokens(AuthTokens::new(jwt(-60), old_refresh))
        .await
        .unwrap();

    let (a, b) = tokio::join!(auth.refresh_tokens(), auth.refresh_tokens());
    let expected = AuthTokens::new(new_access, new_refresh);

    assert_eq!(a.unwrap(), expected);
    assert_eq!(b.unwrap(), expected);
    assert_eq!(auth.token_manager().tokens(), Some(expected));
}

#[tokio::test]
async fn rejected_refresh_expires_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "refresh token revoked"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    auth.token_manager()
        .set_tokens(AuthTokens::new(jwt(-60), jwt(3600)))
        .await
        .unwrap();

    let err = auth.refresh_tokens().await.unwrap_err();

    assert_matches!(err, Error::Refresh(cause) => {
        assert_matches!(*cause, Error::Authentication { status: 401, .. });
    });
    assert_eq!(auth.token_manager().state(), AuthState::Expired);
    assert!(auth.access_token().is_none());
}

#[tokio::test]
async fn email_verification_requires_a_session() {
    let server = MockServer::start().await;
    let auth = service(&server).await;

    assert_matches!(
        auth.send_validation_code().await.unwrap_err(),
        Error::NotAuthenticated
    );
    assert_matches!(
        auth.verify_email("123456").await.unwrap_err(),
        Error::NotAuthenticated
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn verify_email_posts_the_code() {
    let access = jwt(600);
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/validation-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-email"))
        .and(body_json(serde_json::json!({ "code": "123456" })))
        .and(wiremock::matchers::header(
            "authorization",
            format!("Bearer {access}"),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = service(&server).await;
    auth.token_manager()
        .set_tokens(AuthTokens::new(access, jwt(3600)))
        .await
        .unwrap();

    auth.send_validation_code().await.unwrap();
    auth.verify_email("123456").await.unwrap();
}

#[tokio::test]
async fn verify_email_rejects_an_empty_code() {
    let server = MockServer::start().await;
    let auth = service(&server).await;
    auth.token_manager()
        .set_tokens(AuthTokens::new(jwt(600), jwt(3600)))
        .await
        .unwrap();

    let err = auth.verify_email("  ").await.unwrap_err();

    assert_matches!(err, Error::Validation { .. });
    assert!(server.received_requests().await.unwrap().is_empty());
}
