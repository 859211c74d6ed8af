//! Shared helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cervantes_client::{ClientConfig, ClientConfigBuilder, RetryConfig};
use chrono::Utc;

/// Build an unsigned JWT whose `exp` claim is `exp_offset_secs` from now.
pub fn jwt(exp_offset_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = Utc::now().timestamp() + exp_offset_secs;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

/// Client config pointing at a test server, with backoff delays small enough
/// to keep retry tests fast.
pub fn fast_config(base_url: &str) -> ClientConfig {
    ClientConfigBuilder::new()
        .base_url(base_url)
        .timeout(Duration::from_secs(5))
        .retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        })
        .build()
}

/// JSON body of a token-pair response.
pub fn token_pair_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({ "access": access, "refresh": refresh })
}
