//! Request handling and transformation.
//!
//! # Responsibilities
//! - Decide whether the client asked for a persistent connection
//! - Extract routing-relevant information (virtual host, path)
//! - Aggregate the request body within the configured limit
//! - Normalize the request before it is written upstream
//!
//! # Design Decisions
//! - The outbound request is always HTTP/1.1; upstream keep-alive is ours to decide
//! - Only the client's `Connection` header is removed, everything else is forwarded as-is

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use hyper::{Method, Request, Uri, Version};

/// Failure to read the client's request body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),
    #[error("failed to read request body: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Persistent-connection semantics of an HTTP message.
///
/// `Connection: close` always wins; HTTP/1.0 needs an explicit
/// `Connection: keep-alive`; HTTP/1.1 defaults to persistent.
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    if connection_has_token(headers, "close") {
        return false;
    }
    match version {
        Version::HTTP_09 => false,
        Version::HTTP_10 => connection_has_token(headers, "keep-alive"),
        _ => true,
    }
}

fn connection_has_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Virtual host of the request: the raw `Host` header.
pub fn virtual_host<B>(request: &Request<B>) -> Option<&str> {
    request.headers().get(HOST).and_then(|h| h.to_str().ok())
}

/// Read the full request body, failing once it grows past `limit` bytes.
pub async fn read_body(body: Incoming, limit: usize) -> Result<Bytes, BodyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => Err(BodyError::TooLarge(limit)),
        Err(e) => Err(BodyError::Read(e)),
    }
}

/// The request as it will be written upstream, kept so it can be rebuilt
/// for each attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl OutboundRequest {
    /// Normalize the head of a client request for forwarding.
    ///
    /// - version is forced to HTTP/1.1
    /// - the client's `Connection` header is removed
    /// - the URI is reduced to origin form
    /// - an aggregated chunked body is re-framed with `Content-Length`
    pub fn normalize<B>(request: &Request<B>, body_len: usize) -> Self {
        let mut headers = request.headers().clone();
        headers.remove(CONNECTION);

        if headers.remove(TRANSFER_ENCODING).is_some() {
            headers.insert(CONTENT_LENGTH, body_len.into());
        }

        let uri = request
            .uri()
            .path_and_query()
            .map(|pq| Uri::from(pq.clone()))
            .unwrap_or_else(|| Uri::from_static("/"));

        Self {
            method: request.method().clone(),
            uri,
            headers,
        }
    }

    /// Build one attempt's request around `body`.
    pub fn build(&self, body: Bytes) -> Request<Full<Bytes>> {
        let mut request = Request::new(Full::new(body));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = self.headers.clone();
        request
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_keep_alive_defaults() {
        assert!(is_keep_alive(Version::HTTP_11, &HeaderMap::new()));
        assert!(!is_keep_alive(Version::HTTP_10, &HeaderMap::new()));
    }

    #[test]
    fn test_keep_alive_connection_header() {
        assert!(!is_keep_alive(Version::HTTP_11, &headers(&[("connection", "close")])));
        assert!(!is_keep_alive(Version::HTTP_11, &headers(&[("connection", "Upgrade, Close")])));
        assert!(is_keep_alive(Version::HTTP_10, &headers(&[("connection", "Keep-Alive")])));
        assert!(!is_keep_alive(
            Version::HTTP_10,
            &headers(&[("connection", "keep-alive"), ("connection", "close")])
        ));
    }

    #[test]
    fn test_virtual_host() {
        let request = Request::builder()
            .uri("/")
            .header("host", "example.com:8080")
            .body(())
            .unwrap();
        assert_eq!(virtual_host(&request), Some("example.com:8080"));

        let request = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(virtual_host(&request), None);
    }

    #[test]
    fn test_normalize() {
        let request = Request::builder()
            .method(Method::POST)
            .version(Version::HTTP_10)
            .uri("http://example.com/api/items?page=2")
            .header("host", "example.com")
            .header("connection", "keep-alive")
            .header("x-custom", "1")
            .body(())
            .unwrap();

        let outbound = OutboundRequest::normalize(&request, 5);
        let built = outbound.build(Bytes::from_static(b"hello"));

        assert_eq!(built.version(), Version::HTTP_11);
        assert_eq!(built.method(), Method::POST);
        assert_eq!(built.uri(), "/api/items?page=2");
        assert!(built.headers().get(CONNECTION).is_none());
        assert_eq!(built.headers()["host"], "example.com");
        assert_eq!(built.headers()["x-custom"], "1");
        assert!(built.headers().get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_normalize_reframes_chunked_body() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/upload")
            .header("transfer-encoding", "chunked")
            .body(())
            .unwrap();

        let outbound = OutboundRequest::normalize(&request, 42);
        assert!(outbound.headers().get(TRANSFER_ENCODING).is_none());
        assert_eq!(outbound.headers()[CONTENT_LENGTH], "42");
    }
}
