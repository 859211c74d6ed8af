//! Resilient HTTP client
//!
//! Every request flows through the interceptor chain, carries its own timeout,
//! and is retried with jittered exponential backoff when the retry predicate
//! accepts the classified error.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::interceptor::InterceptorChain;
use super::request::Request;
use super::response::Response;
use super::retry::{RetryConfig, RetryPredicate, default_retry_predicate};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// HTTP client for the Cervantes API.
///
/// Cheap to clone; all clones share the same connection pool, interceptor
/// chain, and retry policy. Each request owns its own attempt counter, so any
/// number of requests can run concurrently.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

struct HttpClientInner {
    http: reqwest::Client,
    base_url: Option<Url>,
    timeout: Duration,
    retry: RetryConfig,
    predicate: RetryPredicate,
    interceptors: InterceptorChain,
}

impl HttpClient {
    /// Create a client with no interceptors and the default retry predicate.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::builder(config.clone()).build()
    }

    /// Create a builder for advanced configuration.
    pub fn builder(config: ClientConfig) -> HttpClientBuilder {
        HttpClientBuilder {
            config,
            interceptors: InterceptorChain::new(),
            predicate: None,
        }
    }

    /// Send a GET request and decode the response into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(Method::GET, path, None).await
    }

    /// Send a POST request with a JSON body and decode the response into `T`.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(Method::POST, path, Some(serde_json::to_vec(body)?))
            .await
    }

    /// Send a PUT request with a JSON body and decode the response into `T`.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(Method::PUT, path, Some(serde_json::to_vec(body)?))
            .await
    }

    /// Send a DELETE request and decode the response into `T`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(Method::DELETE, path, None).await
    }

    /// Upload a multipart form.
    ///
    /// The form body is passed through untouched and no content-type header is
    /// set so the multipart boundary survives. Multipart bodies are not
    /// replayable, so the upload runs as a single attempt.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let url = self.resolve_url(path)?;
        let request = self
            .inner
            .interceptors
            .before_request(Request::new(Method::POST, url.clone()))
            .await?;

        let mut req = self
            .inner
            .http
            .request(Method::POST, url)
            .timeout(self.inner.timeout);
        for (key, value) in request.headers() {
            if key != http::header::CONTENT_TYPE {
                req = req.header(key, value);
            }
        }

        let response = match req.multipart(form).send().await {
            Ok(resp) => {
                let status = resp.status();
                let headers = resp.headers().clone();
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::Network(e.to_string()))?
                    .to_vec();
                Response::new(status, headers, body)
            }
            Err(e) if e.is_timeout() => return Err(Error::Timeout(self.inner.timeout)),
            Err(e) => return Err(Error::Network(e.to_string())),
        };

        let (_, classified) = self.inner.interceptors.after_response(&response).await;
        if response.is_success() {
            return response.parse_result();
        }
        Err(classified.unwrap_or_else(|| {
            Error::from_response(response.status().as_u16(), &response.text())
        }))
    }

    /// Resolve a path against the configured base URL.
    ///
    /// Absolute URLs pass through unchanged; relative paths are joined to the
    /// base with exactly one slash between them.
    fn resolve_url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path
                .parse()
                .map_err(|e| Error::InvalidUrl(format!("{e}: {path}")));
        }
        let base = self.inner.base_url.as_ref().ok_or_else(|| {
            Error::InvalidUrl(format!("relative path '{path}' requires a base URL"))
        })?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        joined
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("{e}: {joined}")))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let url = self.resolve_url(path)?;
        let mut attempt: u32 = 1;
        let mut reissued = false;

        loop {
            let mut request = Request::new(method.clone(), url.clone());
            if let Some(bytes) = &body {
                request = request
                    .header("content-type", "application/json")?
                    .body(bytes.clone());
            }
            let request = self.inner.interceptors.before_request(request).await?;

            let error = match self.dispatch(request).await {
                Ok(response) => {
                    let (reissue, classified) =
                        self.inner.interceptors.after_response(&response).await;
                    if response.is_success() {
                        return response.parse_result();
                    }
                    if reissue && !reissued {
                        // One-shot reissue after a credential refresh; does
                        // not consume a retry attempt.
                        reissued = true;
                        tracing::debug!(%url, "reissuing request with refreshed credentials");
                        continue;
                    }
                    classified.unwrap_or_else(|| {
                        Error::from_response(response.status().as_u16(), &response.text())
                    })
                }
                Err(error) => error,
            };

            if attempt < self.inner.retry.max_attempts && (self.inner.predicate)(&error, attempt) {
                let delay = self.inner.retry.delay_for_attempt(attempt);
                tracing::debug!(attempt, ?delay, error = %error, "retrying request after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(error);
        }
    }

    async fn dispatch(&self, mut request: Request) -> Result<Response> {
        let mut req = self
            .inner
            .http
            .request(request.method().clone(), request.url().clone())
            .timeout(self.inner.timeout);
        for (key, value) in request.headers() {
            req = req.header(key, value);
        }
        if let Some(body) = request.take_body() {
            req = req.body(body);
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                let headers = resp.headers().clone();
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::Network(e.to_string()))?
                    .to_vec();
                Ok(Response::new(status, headers, body))
            }
            Err(e) if e.is_timeout() => Err(Error::Timeout(self.inner.timeout)),
            Err(e) => Err(Error::Network(e.to_string())),
        }
    }
}

/// Builder for creating a configured [`HttpClient`].
pub struct HttpClientBuilder {
    config: ClientConfig,
    interceptors: InterceptorChain,
    predicate: Option<RetryPredicate>,
}

impl HttpClientBuilder {
    /// Append an interceptor to the chain.
    pub fn interceptor(mut self, interceptor: Box<dyn super::interceptor::Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Override the retry predicate.
    pub fn retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpClient> {
        let base_url = match &self.config.base_url {
            Some(raw) => {
                if raw.trim().is_empty() {
                    return Err(Error::InvalidUrl("base URL cannot be empty".to_string()));
                }
                let url: Url = raw.parse().map_err(|e| Error::InvalidUrl(format!("{e}")))?;
                match url.scheme() {
                    "http" | "https" => {}
                    scheme => {
                        return Err(Error::InvalidUrl(format!(
                            "invalid URL scheme '{scheme}', only 'http' and 'https' are supported"
                        )));
                    }
                }
                Some(url)
            }
            None => None,
        };

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(format!("cervantes-client/{}", crate::VERSION))
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(HttpClient {
            inner: Arc::new(HttpClientInner {
                http,
                base_url,
                timeout: self.config.timeout,
                retry: self.config.retry,
                predicate: self
                    .predicate
                    .unwrap_or_else(|| Arc::new(default_retry_predicate)),
                interceptors: self.interceptors,
            }),
        })
    }
}
