//! Upstream Proxy
//!
//! Forwards requests the cache could not answer to the configured origin and
//! streams the origin's response back.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::HOST, HeaderMap},
    response::Response,
};
use http_body::Body as _;
use tracing::warn;

use crate::context::is_hop_by_hop;
use crate::error::Result;
use crate::gateway::AppState;

/// Fallback handler forwarding the request to the upstream origin.
pub async fn proxy_handler(State(state): State<AppState>, req: Request) -> Result<Response> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.upstream, path_and_query);

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(HOST);

    let mut upstream = state.client.request(parts.method, &url).headers(headers);
    // Bodiless requests go out without a chunked empty body
    if !body.is_end_stream() {
        upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream = upstream
        .send()
        .await
        .inspect_err(|err| warn!(url = %url, error = %err, "upstream request failed"))?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop: Vec<_> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(name);
    }
}
