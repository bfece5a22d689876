//! Forwarding to the API server behind the gate.
//!
//! Bodies are streamed in both directions, so long-lived watch responses
//! reach the client as the upstream produces them.

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

use crate::error::ProxyError;

/// Request body chunks buffered between the client and the upstream.
const REQUEST_CHUNK_BUFFER: usize = 16;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.contains(&name)
}

/// Pipe the client body into a stream reqwest can send.
fn stream_body(body: Body) -> reqwest::Body {
    let (tx, rx) = mpsc::channel(REQUEST_CHUNK_BUFFER);
    let mut chunks = body.into_data_stream();
    tokio::spawn(async move {
        while let Some(chunk) = chunks.next().await {
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });
    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
}

impl Upstream {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProxyError> {
        let base_url: String = base_url.into();
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: Request) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();

        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|_| ProxyError::Method(parts.method.to_string()))?;
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut upstream_request = self
            .client
            .request(method, format!("{}{}", self.base_url, path_and_query));
        for (name, value) in parts.headers.iter() {
            if !is_hop_by_hop(name.as_str()) {
                upstream_request = upstream_request.header(name.as_str(), value.as_bytes());
            }
        }
        if !body.is_end_stream() {
            upstream_request = upstream_request.body(stream_body(body));
        }

        let upstream_response = upstream_request.send().await?;

        let status = upstream_response.status().as_u16();
        let mut response = axum::http::Response::builder()
            .status(StatusCode::from_u16(status).map_err(|_| ProxyError::Status(status))?);
        for (name, value) in upstream_response.headers() {
            if is_hop_by_hop(name.as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                response = response.header(name, value);
            }
        }

        response
            .body(Body::from_stream(upstream_response.bytes_stream()))
            .map_err(|_| ProxyError::Status(status))
    }
}

/// Fallback handler that forwards the request upstream.
pub async fn forward(State(upstream): State<Upstream>, request: Request) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    if request.headers().contains_key(header::UPGRADE) {
        tracing::warn!(%method, %uri, "Protocol upgrade requested, not supported by the proxy");
        return (StatusCode::NOT_IMPLEMENTED, "protocol upgrade not supported").into_response();
    }

    match upstream.send(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(%method, %uri, error = %e, "Upstream request failed");
            (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
        }
    }
}
