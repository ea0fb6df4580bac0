use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use tollgate_config::RouteSettings;

use crate::state::GatewayState;

/// Headers that never cross the proxy boundary.
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

/// One downstream service behind the gateway.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    pub prefix: String,
    pub upstream: String,
}

/// Prefix-routed upstream table. First matching prefix wins, in
/// configuration order.
#[derive(Debug, Clone, Default)]
pub struct ProxyTable {
    routes: Vec<ProxyRoute>,
}

impl ProxyTable {
    pub fn from_settings(routes: &[RouteSettings]) -> Self {
        Self {
            routes: routes
                .iter()
                .map(|r| ProxyRoute {
                    prefix: r.prefix.clone(),
                    upstream: r.upstream.clone(),
                })
                .collect(),
        }
    }

    pub fn route_for(&self, path: &str) -> Option<&ProxyRoute> {
        self.routes.iter().find(|r| path.starts_with(r.prefix.as_str()))
    }
}

/// Fallback handler: forward the (already relay-filtered) request to the
/// downstream service owning its path prefix.
pub async fn forward(State(state): State<Arc<GatewayState>>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let Some(route) = state.proxy.route_for(&path) else {
        debug!(%path, "no downstream route");
        return StatusCode::NOT_FOUND.into_response();
    };

    let query = req
        .uri()
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let url = format!("{}{}{}", route.upstream.trim_end_matches('/'), path, query);

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, %path, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let mut headers = parts.headers.clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }

    let upstream_response = match state
        .upstream_http
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(bytes)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, upstream = %route.upstream, "downstream unreachable");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    let body = match upstream_response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, upstream = %route.upstream, "failed to read downstream body");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
