//! # Cervantes client core
//!
//! Client-side session and transport resilience layer for the Cervantes API:
//! token lifecycle management and a resilient HTTP request pipeline.
//!
//! - [`AuthService`] orchestrates login/signup/refresh/logout and is the
//!   façade domain repositories depend on for the current access token.
//! - [`TokenManager`] owns the authentication state machine, persists tokens
//!   through a pluggable [`TokenStorage`], and shares one in-flight refresh
//!   among concurrent callers.
//! - [`HttpClient`] runs requests through an interceptor chain with retry,
//!   jittered exponential backoff, and a typed error taxonomy.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cervantes_client::{AuthService, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::with_base_url("https://api.cervantes.example");
//!     let auth = AuthService::new(config).await?;
//!
//!     auth.login("reader@example.com", "correct horse battery").await?;
//!     assert!(auth.is_authenticated());
//!     Ok(())
//! }
//! ```
//!
//! Construct one service per application context and pass it to consumers;
//! there are no ambient globals.

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Re-export commonly used types
pub use auth::{
    AuthService, AuthState, AuthStateChange, AuthTokens, MemoryTokenStorage, TokenManager,
    TokenManagerOptions, TokenRefresher, TokenStorage,
};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use http::{HttpClient, RetryConfig};

// Module declarations
pub mod auth;
pub mod config;
pub mod error;
pub mod http;

// Re-export key dependencies for convenience
pub use async_trait::async_trait;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        AuthService, AuthState, AuthStateChange, AuthTokens, ClientConfig, Error, HttpClient,
        Result, TokenManager, TokenStorage,
    };
}

/// Crate version, taken from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default key prefix for the durable token storage record
pub const DEFAULT_STORAGE_PREFIX: &str = "cervantes_auth_";
