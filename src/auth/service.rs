//! Authentication façade
//!
//! Wraps the signup/login/refresh/logout/email-verification use cases and
//! wires their results into the token manager. Other domain repositories
//! depend on this type for the current access token; construct one per
//! application context and pass it around explicitly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::manager::{TokenManager, TokenManagerOptions, TokenRefresher};
use super::storage::{MemoryTokenStorage, TokenStorage};
use super::tokens::AuthTokens;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{AuthInterceptor, ErrorInterceptor, HttpClient, LoggingInterceptor};

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    username: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyEmailRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

/// Exchanges refresh tokens over HTTP using a client without credential
/// injection, so a refresh can never recurse into itself.
struct HttpRefresher {
    client: HttpClient,
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, refresh_token: String) -> Result<AuthTokens> {
        let pair: TokenPair = self
            .client
            .post(
                "/auth/refresh",
                &RefreshRequest {
                    refresh: &refresh_token,
                },
            )
            .await?;
        Ok(AuthTokens::new(pair.access, pair.refresh))
    }
}

/// Public façade for authentication use cases.
#[derive(Clone)]
pub struct AuthService {
    client: HttpClient,
    manager: TokenManager,
    refresher: Arc<dyn TokenRefresher>,
}

impl AuthService {
    /// Create a service with the default in-memory token storage.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        Self::with_storage(config, Arc::new(MemoryTokenStorage::new())).await
    }

    /// Create a service with injected token storage.
    pub async fn with_storage(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        let manager =
            TokenManager::new(TokenManagerOptions::from_config(&config, storage)).await;

        // The refresher uses a bare client: error classification only, no
        // bearer injection.
        let refresh_client = HttpClient::builder(config.clone())
            .interceptor(Box::new(ErrorInterceptor))
            .build()?;
        let refresher: Arc<dyn TokenRefresher> = Arc::new(HttpRefresher {
            client: refresh_client,
        });

        let mut builder = HttpClient::builder(config.clone());
        if config.debug {
            builder = builder.interceptor(Box::new(LoggingInterceptor));
        }
        let client = builder
            .interceptor(Box::new(ErrorInterceptor))
            .interceptor(Box::new(AuthInterceptor::new(
                manager.clone(),
                Arc::clone(&refresher),
            )))
            .build()?;

        Ok(Self {
            client,
            manager,
            refresher,
        })
    }

    /// The token manager backing this service.
    pub fn token_manager(&self) -> &TokenManager {
        &self.manager
    }

    /// The HTTP client with credential injection, for domain repositories.
    pub fn http_client(&self) -> &HttpClient {
        &self.client
    }

    /// The current access token, if a session is held.
    pub fn access_token(&self) -> Option<String> {
        self.manager.tokens().map(|t| t.access().to_string())
    }

    /// Whether a session is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated()
    }

    /// Register a new account.
    pub async fn signup(&self, email: &str, password: &str, username: &str) -> Result<()> {
        validate_email(email)?;
        validate_password(password)?;
        if username.trim().is_empty() {
            return Err(Error::validation("username must not be empty"));
        }
        let _: serde_json::Value = self
            .client
            .post(
                "/auth/signup",
                &SignupRequest {
                    email,
                    password,
                    username,
                },
            )
            .await?;
        Ok(())
    }

    /// Authenticate and store the issued token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens> {
        validate_email(email)?;
        validate_password(password)?;
        let pair: TokenPair = self
            .client
            .post("/auth/login", &Credentials { email, password })
            .await?;
        let tokens = AuthTokens::new(pair.access, pair.refresh);
        self.manager.set_tokens(tokens.clone()).await?;
        Ok(tokens)
    }

    /// Refresh the session, sharing one in-flight refresh among concurrent
    /// callers.
    pub async fn refresh_tokens(&self) -> Result<AuthTokens> {
        let refresher = Arc::clone(&self.refresher);
        self.manager
            .refresh_tokens(move |refresh_token| async move {
                refresher.refresh(refresh_token).await
            })
            .await
    }

    /// End the session.
    ///
    /// The server is told first and the local session is cleared second: if
    /// the network call fails, the session stays intact and the error
    /// propagates.
    pub async fn logout(&self) -> Result<()> {
        let tokens = self.manager.tokens().ok_or(Error::NotAuthenticated)?;
        let _: serde_json::Value = self
            .client
            .post(
                "/auth/logout",
                &RefreshRequest {
                    refresh: tokens.refresh(),
                },
            )
            .await?;
        self.manager.clear_tokens().await
    }

    /// Ask the server to email a validation code. Requires a session.
    pub async fn send_validation_code(&self) -> Result<()> {
        if !self.manager.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        let _: serde_json::Value = self
            .client
            .post("/auth/validation-code", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Confirm the emailed validation code. Requires a session.
    pub async fn verify_email(&self, code: &str) -> Result<()> {
        if !self.manager.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        if code.trim().is_empty() {
            return Err(Error::validation("validation code must not be empty"));
        }
        let _: serde_json::Value = self
            .client
            .post("/auth/verify-email", &VerifyEmailRequest { code })
            .await?;
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') || trimmed.starts_with('@') {
        return Err(Error::validation(format!("invalid email address: '{email}'")));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(Error::validation(
            "password must be at least 8 characters",
        ));
    }
    Ok(())
}
