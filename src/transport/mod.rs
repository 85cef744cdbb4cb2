//! Transport negotiation.
//!
//! One endpoint, three wire encodings. The decision is a pure function of
//! the HTTP method, the request headers, and whether a valid session
//! accompanied the request, so it is unit-testable without any I/O and
//! deterministic for a fixed input triple.

pub mod encoder;

use axum::http::{header, HeaderMap, Method};

/// Media type that opts a POST into NDJSON streaming.
pub const NDJSON_MIME: &str = "application/x-ndjson";

/// The three response strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Single JSON object (or array, for batches); connection closes after
    /// the write.
    Buffered,
    /// Long-lived server-to-client SSE channel for one session.
    SsePush,
    /// Newline-delimited JSON, one frame per outbound message.
    NdjsonStream,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Buffered => "buffered",
            TransportKind::SsePush => "sse",
            TransportKind::NdjsonStream => "ndjson",
        }
    }

    /// Everything the gateway can speak, for the status endpoint.
    pub fn supported() -> [&'static str; 3] {
        ["buffered", "ndjson", "sse"]
    }
}

/// Pick the response transport for a request.
///
/// Priority order: GET with a valid session opens an SSE push channel;
/// a POST that accepts NDJSON streams; everything else gets a buffered
/// JSON response. Malformed or missing Accept headers fall through to
/// buffered.
pub fn choose_transport(
    method: &Method,
    headers: &HeaderMap,
    session_present: bool,
) -> TransportKind {
    if method == Method::GET && session_present {
        return TransportKind::SsePush;
    }
    if method == Method::POST && accept_includes(headers, NDJSON_MIME) {
        return TransportKind::NdjsonStream;
    }
    TransportKind::Buffered
}

fn accept_includes(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| {
            accept.split(',').any(|part| {
                part.split(';')
                    .next()
                    .map(|media_type| media_type.trim().eq_ignore_ascii_case(token))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn get_with_session_opens_sse() {
        assert_eq!(
            choose_transport(&Method::GET, &HeaderMap::new(), true),
            TransportKind::SsePush
        );
        // Accept header is irrelevant on the GET branch.
        assert_eq!(
            choose_transport(&Method::GET, &accept(NDJSON_MIME), true),
            TransportKind::SsePush
        );
    }

    #[test]
    fn get_without_session_falls_through_to_buffered() {
        assert_eq!(
            choose_transport(&Method::GET, &HeaderMap::new(), false),
            TransportKind::Buffered
        );
    }

    #[test]
    fn post_accepting_ndjson_streams() {
        assert_eq!(
            choose_transport(&Method::POST, &accept("application/x-ndjson"), false),
            TransportKind::NdjsonStream
        );
        assert_eq!(
            choose_transport(&Method::POST, &accept("application/x-ndjson"), true),
            TransportKind::NdjsonStream
        );
    }

    #[test]
    fn ndjson_token_is_found_in_compound_accept_headers() {
        assert_eq!(
            choose_transport(
                &Method::POST,
                &accept("application/json, application/x-ndjson;q=0.9"),
                false
            ),
            TransportKind::NdjsonStream
        );
        assert_eq!(
            choose_transport(&Method::POST, &accept("APPLICATION/X-NDJSON"), false),
            TransportKind::NdjsonStream
        );
    }

    #[test]
    fn plain_json_and_missing_accept_stay_buffered() {
        assert_eq!(
            choose_transport(&Method::POST, &accept("application/json"), true),
            TransportKind::Buffered
        );
        assert_eq!(
            choose_transport(&Method::POST, &HeaderMap::new(), false),
            TransportKind::Buffered
        );
        assert_eq!(
            choose_transport(&Method::POST, &accept("text/html"), false),
            TransportKind::Buffered
        );
    }

    #[test]
    fn malformed_accept_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_bytes(b"application/\xFFjunk").unwrap(),
        );
        assert_eq!(
            choose_transport(&Method::POST, &headers, false),
            TransportKind::Buffered
        );
    }
}
