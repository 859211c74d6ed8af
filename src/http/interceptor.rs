//! Interceptors for request/response processing
//!
//! The chain runs request hooks in registration order and response hooks in
//! reverse, so the interceptor closest to the wire sees the response first.

use async_trait::async_trait;

use super::{Request, Response};
use crate::auth::{TokenManager, TokenRefresher};
use crate::error::{Error, Result};
use std::sync::Arc;

/// What an interceptor wants the client to do after observing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Nothing to do; continue normal classification.
    Proceed,
    /// Re-send the original request once (credentials were refreshed).
    Reissue,
}

/// Trait for HTTP interceptors.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Process a request before sending.
    async fn before_request(&self, request: Request) -> Result<Request> {
        Ok(request)
    }

    /// Observe a response after receiving. Returning an error short-circuits
    /// into the failure path with that error as the classification.
    async fn after_response(&self, _response: &Response) -> Result<Disposition> {
        Ok(Disposition::Proceed)
    }
}

/// Ordered interceptor pipeline.
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptorChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Add an interceptor to the end of the chain.
    pub fn push(&mut self, interceptor: Box<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Run request hooks in order.
    pub async fn before_request(&self, mut request: Request) -> Result<Request> {
        for interceptor in &self.interceptors {
            request = interceptor.before_request(request).await?;
        }
        Ok(request)
    }

    /// Run response hooks in reverse order.
    ///
    /// Returns whether any interceptor requested a reissue, and the first
    /// classification error produced along the way.
    pub async fn after_response(&self, response: &Response) -> (bool, Option<Error>) {
        let mut reissue = false;
        let mut classified = None;
        for interceptor in self.interceptors.iter().rev() {
            match interceptor.after_response(response).await {
                Ok(Disposition::Reissue) => reissue = true,
                Ok(Disposition::Proceed) => {}
                Err(err) => {
                    if classified.is_none() {
                        classified = Some(err);
                    }
                }
            }
        }
        (reissue, classified)
    }
}

/// Injects the current bearer token and transparently refreshes a stale one.
///
/// On 401/403 with an expired access token and a live refresh token, this
/// drives the manager's single-flight refresh and asks the client to reissue
/// the original request once. Routine token expiry therefore never surfaces as
/// an [`Error::Authentication`] to callers.
pub struct AuthInterceptor {
    manager: TokenManager,
    refresher: Arc<dyn TokenRefresher>,
}

impl AuthInterceptor {
    /// Create a new auth interceptor bound to a token manager.
    pub fn new(manager: TokenManager, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { manager, refresher }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn before_request(&self, request: Request) -> Result<Request> {
        // Respect an explicitly set Authorization header.
        if request.headers().contains_key(http::header::AUTHORIZATION) {
            return Ok(request);
        }
        match self.manager.tokens() {
            Some(tokens) => request.header("authorization", &format!("Bearer {}", tokens.access())),
            None => Ok(request),
        }
    }

    async fn after_response(&self, response: &Response) -> Result<Disposition> {
        let status = response.status().as_u16();
        if status != 401 && status != 403 {
            return Ok(Disposition::Proceed);
        }
        if !self.manager.needs_refresh() {
            // Credentials are wrong, not stale; let classification proceed.
            return Ok(Disposition::Proceed);
        }

        tracing::debug!(status, "access token rejected, attempting refresh");
        let refresher = Arc::clone(&self.refresher);
        match self
            .manager
            .refresh_tokens(move |refresh_token| async move {
                refresher.refresh(refresh_token).await
            })
            .await
        {
            Ok(_) => Ok(Disposition::Reissue),
            Err(err) => {
                tracing::warn!(error = %err, "mid-flight token refresh failed");
                Ok(Disposition::Proceed)
            }
        }
    }
}

/// Maps non-2xx responses into the error taxonomy.
pub struct ErrorInterceptor;

#[async_trait]
impl Interceptor for ErrorInterceptor {
    async fn after_response(&self, response: &Response) -> Result<Disposition> {
        if response.is_error() {
            return Err(Error::from_response(
                response.status().as_u16(),
                &response.text(),
            ));
        }
        Ok(Disposition::Proceed)
    }
}

/// Interceptor that logs requests and responses.
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn before_request(&self, request: Request) -> Result<Request> {
        tracing::debug!("sending {} request to {}", request.method(), request.url());
        Ok(request)
    }

    async fn after_response(&self, response: &Response) -> Result<Disposition> {
        tracing::debug!("received response with status: {}", response.status());
        Ok(Disposition::Proceed)
    }
}
