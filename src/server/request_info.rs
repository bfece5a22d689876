//! Request metadata used by the license filter.
//!
//! The resolver runs ahead of the filter and stores a [`RequestInfo`] in the
//! request extensions; the filter only reads it.

use axum::{
    extract::Request,
    http::{Method, Uri},
    middleware::Next,
    response::Response,
};

/// Verb and path of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Lower-case HTTP method.
    pub verb: String,
    /// Path without the query string.
    pub path: String,
}

impl RequestInfo {
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
        }
    }

    pub fn from_parts(method: &Method, uri: &Uri) -> Self {
        Self::new(method.as_str().to_ascii_lowercase(), uri.path())
    }
}

/// Middleware that attaches [`RequestInfo`] to every request.
pub async fn resolve_request_info(mut request: Request, next: Next) -> Response {
    let info = RequestInfo::from_parts(request.method(), request.uri());
    request.extensions_mut().insert(info);
    next.run(request).await
}
