//! Response construction for the client side.
//!
//! # Responsibilities
//! - Synthesize the proxy's own responses (404, 500, 400, 413)
//! - Rewrite relayed upstream responses for the client connection
//! - Decide whether an upstream session may be kept after its response
//!
//! # Design Decisions
//! - Every response states the client connection's fate in `Connection`
//! - Synthesized responses are empty with an explicit `Content-Length: 0`
//! - Upstream hop-by-hop headers never reach the client

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::{Response, StatusCode};

use crate::http::request::is_keep_alive;

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

fn connection_value(keep_alive: bool) -> HeaderValue {
    if keep_alive {
        HeaderValue::from_static("keep-alive")
    } else {
        HeaderValue::from_static("close")
    }
}

fn empty(status: StatusCode, keep_alive: bool) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    headers.insert(CONNECTION, connection_value(keep_alive));
    response
}

/// No route, no pool, or no server for the request.
pub fn not_found(keep_alive: bool) -> Response<Full<Bytes>> {
    empty(StatusCode::NOT_FOUND, keep_alive)
}

/// Every forwarding attempt failed.
pub fn upstream_error(keep_alive: bool) -> Response<Full<Bytes>> {
    empty(StatusCode::INTERNAL_SERVER_ERROR, keep_alive)
}

/// The request body exceeded the configured limit. The rest of the body is
/// never read, so the connection cannot be reused.
pub fn payload_too_large() -> Response<Full<Bytes>> {
    empty(StatusCode::PAYLOAD_TOO_LARGE, false)
}

/// The request body could not be read.
pub fn bad_request() -> Response<Full<Bytes>> {
    empty(StatusCode::BAD_REQUEST, false)
}

/// Turn an upstream response into the client response.
pub fn relay(response: Response<Bytes>, keep_alive: bool) -> Response<Full<Bytes>> {
    let (mut parts, body) = response.into_parts();

    parts.headers.remove(CONNECTION);
    parts.headers.remove(KEEP_ALIVE);
    // The body was aggregated; hyper frames it from its exact length.
    parts.headers.remove(TRANSFER_ENCODING);
    parts.headers.insert(CONNECTION, connection_value(keep_alive));

    Response::from_parts(parts, Full::new(body))
}

/// Whether the upstream session can serve another request after `response`.
pub fn upstream_reusable<B>(response: &Response<B>) -> bool {
    is_keep_alive(response.version(), response.headers())
}
