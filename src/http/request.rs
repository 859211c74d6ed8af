//! HTTP request value passed through the interceptor chain

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::error::{Error, Result};

/// An outgoing request as seen by interceptors.
///
/// Interceptors receive the request by value, may rewrite headers, and hand it
/// back; the client then dispatches whatever came out of the chain.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl Request {
    /// Create a new request.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set a header, replacing any existing value.
    pub fn header(mut self, key: &str, value: &str) -> Result<Self> {
        let key = key
            .parse::<HeaderName>()
            .map_err(|e| Error::HttpClient(format!("invalid header name: {e}")))?;
        let value = value
            .parse::<HeaderValue>()
            .map_err(|e| Error::HttpClient(format!("invalid header value: {e}")))?;
        self.headers.insert(key, value);
        Ok(self)
    }

    /// Set the request body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Get the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Take the body, if any.
    pub fn take_body(&mut self) -> Option<Vec<u8>> {
        self.body.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_replaces_existing() {
        let url: Url = "https://api.example.com/test".parse().unwrap();
        let req = Request::new(Method::GET, url)
            .header("authorization", "Bearer one")
            .unwrap()
            .header("authorization", "Bearer two")
            .unwrap();

        assert_eq!(req.headers().get("authorization").unwrap(), "Bearer two");
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let url: Url = "https://api.example.com/test".parse().unwrap();
        let result = Request::new(Method::GET, url).header("bad header", "v");
        assert!(result.is_err());
    }
}
