//! HTTP layer: client, interceptor chain, and retry policy
//!
//! Requests flow through the interceptor chain (credential injection, failure
//! classification), execute with a per-request timeout, and are retried with
//! jittered exponential backoff for transient faults.

pub use client::{HttpClient, HttpClientBuilder};
pub use interceptor::{
    AuthInterceptor, Disposition, ErrorInterceptor, Interceptor, InterceptorChain,
    LoggingInterceptor,
};
pub use request::Request;
pub use response::Response;
pub use retry::{RetryConfig, RetryPredicate};

mod client;
pub mod interceptor;
mod request;
mod response;
pub mod retry;

// Re-export HTTP types from the http crate for convenience
pub use http::{HeaderMap, Method, StatusCode};
