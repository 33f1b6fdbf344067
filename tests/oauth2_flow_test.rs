// ABOUTME: End-to-end tests for the authorization server facade
// ABOUTME: Register, authorize with PKCE, redeem, verify the JWT, then rotate the refresh token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cadence_auth::config::{parse_ttl, DEFAULT_AUTH_CODE_TTL, DEFAULT_REFRESH_TOKEN_TTL, SESSION_EXPIRY_HOURS};
use cadence_auth::oauth2_server::{
    pkce, AuthCodeStore, AuthorizationServer, AuthorizeRequest, ClientRegistrationRequest,
    ClientRegistry, RefreshTokenStore, SessionStore, TokenRequest,
};
use std::sync::Arc;

struct TestServer {
    server: AuthorizationServer,
    registry: Arc<ClientRegistry>,
    sessions: Arc<SessionStore>,
}

async fn create_test_server() -> TestServer {
    common::init_test_logging();

    let registry = Arc::new(common::create_test_registry(vec!["https://example.com/cb".to_owned()]).await);
    let codes = Arc::new(AuthCodeStore::new(parse_ttl(DEFAULT_AUTH_CODE_TTL).unwrap()));
    let refresh_tokens = Arc::new(RefreshTokenStore::new(
        parse_ttl(DEFAULT_REFRESH_TOKEN_TTL).unwrap(),
    ));
    let sessions = Arc::new(SessionStore::new(SESSION_EXPIRY_HOURS));
    let token_service = Arc::new(common::create_token_service("1h"));

    let server = AuthorizationServer::new(
        registry.clone(),
        codes,
        refresh_tokens,
        sessions.clone(),
        token_service,
        common::TEST_AUDIENCE,
    );

    TestServer {
        server,
        registry,
        sessions,
    }
}

async fn register_client(registry: &ClientRegistry) -> String {
    registry
        .register(ClientRegistrationRequest {
            client_name: "Flow Test Client".to_owned(),
            redirect_uris: vec!["https://example.com/cb".to_owned()],
            grant_types: None,
            response_types: None,
            token_endpoint_auth_method: None,
        })
        .await
        .unwrap()
        .client_id
}

fn authorize_request(client_id: &str, code_challenge: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: client_id.to_owned(),
        redirect_uri: "https://example.com/cb".to_owned(),
        scope: Some("calendar:read".to_owned()),
        state: Some("client-state-xyz".to_owned()),
        code_challenge: Some(code_challenge.to_owned()),
        code_challenge_method: Some("S256".to_owned()),
        resource: None,
    }
}

fn redeem_request(client_id: &str, code: &str, verifier: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_owned(),
        client_id: client_id.to_owned(),
        code: Some(code.to_owned()),
        redirect_uri: Some("https://example.com/cb".to_owned()),
        code_verifier: Some(verifier.to_owned()),
        refresh_token: None,
    }
}

#[tokio::test]
async fn test_full_authorization_code_flow() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;
    let session = fixture.sessions.create_session("user-42").await.unwrap();

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);

    // Authorization endpoint issues a code and echoes the client state
    let authorize_response = fixture
        .server
        .authorize(authorize_request(&client_id, &challenge), &session.session_id)
        .await
        .unwrap();
    assert_eq!(
        authorize_response.state.as_deref(),
        Some("client-state-xyz")
    );

    // Token endpoint redeems the code against the correct verifier
    let token_response = fixture
        .server
        .token(redeem_request(&client_id, &authorize_response.code, &verifier))
        .await
        .unwrap();
    assert_eq!(token_response.token_type, "Bearer");
    assert!(token_response.refresh_token.is_some());

    // The minted JWT verifies and carries the registered client id
    let token_service = common::create_token_service("1h");
    let claims = token_service
        .verify_access_token(&token_response.access_token, Some(common::TEST_AUDIENCE))
        .unwrap();
    assert_eq!(claims.client_id, client_id);
    assert_eq!(claims.sub, "user-42");
    assert_eq!(claims.scope.as_deref(), Some("calendar:read"));

    // Redeeming the same code a second time fails closed
    let error = fixture
        .server
        .token(redeem_request(&client_id, &authorize_response.code, &verifier))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_wrong_verifier_burns_the_code() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;
    let session = fixture.sessions.create_session("user-42").await.unwrap();

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    let code = fixture
        .server
        .authorize(authorize_request(&client_id, &challenge), &session.session_id)
        .await
        .unwrap()
        .code;

    let wrong_verifier = pkce::generate_default_verifier().unwrap();
    let error = fixture
        .server
        .token(redeem_request(&client_id, &code, &wrong_verifier))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_grant");

    // The failed PKCE attempt consumed the code; the correct verifier can
    // no longer redeem it
    let error = fixture
        .server
        .token(redeem_request(&client_id, &code, &verifier))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_refresh_token_grant_rotates() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;
    let session = fixture.sessions.create_session("user-42").await.unwrap();

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    let code = fixture
        .server
        .authorize(authorize_request(&client_id, &challenge), &session.session_id)
        .await
        .unwrap()
        .code;
    let first = fixture
        .server
        .token(redeem_request(&client_id, &code, &verifier))
        .await
        .unwrap();
    let first_refresh = first.refresh_token.unwrap();

    let refresh_request = |token: &str| TokenRequest {
        grant_type: "refresh_token".to_owned(),
        client_id: client_id.clone(),
        code: None,
        redirect_uri: None,
        code_verifier: None,
        refresh_token: Some(token.to_owned()),
    };

    let second = fixture.server.token(refresh_request(&first_refresh)).await.unwrap();
    let second_refresh = second.refresh_token.unwrap();
    assert_ne!(first_refresh, second_refresh);
    assert_eq!(second.scope.as_deref(), Some("calendar:read"));

    // The consumed refresh token is dead; the rotated one still works
    let error = fixture
        .server
        .token(refresh_request(&first_refresh))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_grant");
    assert!(fixture.server.token(refresh_request(&second_refresh)).await.is_ok());
}

#[tokio::test]
async fn test_authorize_requires_valid_session() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    let error = fixture
        .server
        .authorize(authorize_request(&client_id, &challenge), "no-such-session")
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");
}

#[tokio::test]
async fn test_authorize_rejects_unregistered_redirect_uri() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;
    let session = fixture.sessions.create_session("user-42").await.unwrap();

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    let mut request = authorize_request(&client_id, &challenge);
    request.redirect_uri = "https://example.com/other".to_owned();

    let error = fixture
        .server
        .authorize(request, &session.session_id)
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_redirect_uri");
}

#[tokio::test]
async fn test_authorize_requires_pkce() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;
    let session = fixture.sessions.create_session("user-42").await.unwrap();

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);

    let mut request = authorize_request(&client_id, &challenge);
    request.code_challenge = None;
    let error = fixture
        .server
        .authorize(request, &session.session_id)
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");

    let mut request = authorize_request(&client_id, &challenge);
    request.code_challenge_method = Some("plain".to_owned());
    let error = fixture
        .server
        .authorize(request, &session.session_id)
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");
}

#[tokio::test]
async fn test_token_rejects_unknown_client_and_grant() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;

    let error = fixture
        .server
        .token(redeem_request("cadence_unknown", "some-code", &"v".repeat(64)))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_client");

    let error = fixture
        .server
        .token(TokenRequest {
            grant_type: "client_credentials".to_owned(),
            client_id,
            code: None,
            redirect_uri: None,
            code_verifier: None,
            refresh_token: None,
        })
        .await
        .unwrap_err();
    assert_eq!(error.error, "unsupported_grant_type");
}

#[tokio::test]
async fn test_token_rejects_redirect_uri_mismatch() {
    let fixture = create_test_server().await;
    let client_id = register_client(&fixture.registry).await;
    let session = fixture.sessions.create_session("user-42").await.unwrap();

    let verifier = pkce::generate_default_verifier().unwrap();
    let challenge = pkce::challenge_from_verifier(&verifier);
    let code = fixture
        .server
        .authorize(authorize_request(&client_id, &challenge), &session.session_id)
        .await
        .unwrap()
        .code;

    let mut request = redeem_request(&client_id, &code, &verifier);
    request.redirect_uri = Some("https://example.com/other".to_owned());
    let error = fixture.server.token(request).await.unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}
