//! HTTP response handling

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// HTTP response wrapper.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Check if the response is successful (2xx status).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response is an error (4xx or 5xx status).
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// Decode a successful response body into `T`.
    ///
    /// The deserialization target is the response schema: a 2xx body that does
    /// not match it becomes [`Error::Validation`], which the pipeline never
    /// retries. Non-2xx responses are classified by status code.
    pub fn parse_result<T: DeserializeOwned>(self) -> Result<T> {
        if self.is_error() {
            return Err(Error::from_response(self.status.as_u16(), &self.text()));
        }
        serde_json::from_slice(&self.body).map_err(|e| Error::Validation {
            message: format!("response body did not match the expected shape: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn response(status: u16, body: &str) -> Response {
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.as_bytes().to_vec(),
        )
    }

    #[test]
    fn test_parse_result_success() {
        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }

        let parsed: Payload = response(200, r#"{"ok":true}"#).parse_result().unwrap();
        assert!(parsed.ok);
    }

    #[test]
    fn test_parse_result_decode_failure_is_validation() {
        #[derive(Debug, serde::Deserialize)]
        struct Payload {
            #[allow(dead_code)]
            ok: bool,
        }

        let err = response(200, r#"{"unexpected":1}"#)
            .parse_result::<Payload>()
            .unwrap_err();
        assert_matches!(err, Error::Validation { source: Some(_), .. });
    }

    #[test]
    fn test_parse_result_classifies_errors() {
        let err = response(503, r#"{"message":"overloaded"}"#)
            .parse_result::<serde_json::Value>()
            .unwrap_err();
        assert_matches!(err, Error::Server { status: 503, .. });
    }
}
