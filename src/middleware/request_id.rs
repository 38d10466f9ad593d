//! Request ID propagation middleware.
//!
//! Every request gets a stable identifier that is carried through request
//! extensions and echoed back on the response. Incoming `x-request-id` (or
//! `x-correlation-id` from upstream proxies) is honored, otherwise a fresh
//! UUID is generated.

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Identifier attached to each request, used to correlate audit events.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn incoming_id(headers: &HeaderMap) -> Option<String> {
    [REQUEST_ID_HEADER, CORRELATION_ID_HEADER]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = incoming_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_id_prefers_request_id_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        headers.insert("x-correlation-id", HeaderValue::from_static("corr-1"));

        assert_eq!(incoming_id(&headers).as_deref(), Some("req-1"));
    }

    #[test]
    fn incoming_id_falls_back_to_correlation_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", HeaderValue::from_static("corr-2"));

        assert_eq!(incoming_id(&headers).as_deref(), Some("corr-2"));
    }

    #[test]
    fn incoming_id_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static(""));

        assert_eq!(incoming_id(&headers), None);
    }
}
