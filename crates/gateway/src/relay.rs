use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use futures::FutureExt;
use tracing::{debug, warn};

use tollgate_oauth::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

use crate::singleflight::RefreshedSession;
use crate::state::GatewayState;

/// The token relay filter.
///
/// Every request outside the public allow-list resolves to one of three
/// terminal outcomes: forwarded with a bearer token (from the access-token
/// cookie, or from a coalesced silent refresh), or rejected 401 with the
/// session cookies cleared. Downstream services only ever see
/// `Authorization: Bearer …` — the `Cookie` header never leaves this
/// process.
pub async fn token_relay(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    if state.is_public_path(req.uri().path()) {
        return next.run(req).await;
    }

    if let Some(access) = jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string())
        && !access.trim().is_empty()
    {
        return forward_with_bearer(req, next, &access).await;
    }

    let refresh_token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.trim().is_empty());
    let Some(refresh_token) = refresh_token else {
        // Nothing to refresh with: reject without touching the provider.
        return unauthenticated(&state, jar);
    };

    let host = request_host(req.headers()).to_string();
    let lifecycle = state.lifecycle.clone();
    let exchange = state.refresh.join(&refresh_token, || {
        let token = refresh_token.clone();
        async move {
            match lifecycle.refresh_access_token(&token, &host).await {
                Ok(outcome) => Some(RefreshedSession {
                    access_token: outcome.access_token,
                    cookies: outcome.cookies,
                }),
                Err(err) if err.is_unauthenticated() => {
                    debug!(error = %err, "silent refresh rejected");
                    None
                }
                Err(err) => {
                    warn!(error = %err, "silent refresh failed");
                    None
                }
            }
        }
        .boxed()
    });

    match exchange.await {
        Some(session) => {
            let mut response = forward_with_bearer(req, next, &session.access_token).await;
            apply_cookies(&mut response, &session.cookies);
            response
        }
        None => unauthenticated(&state, jar),
    }
}

/// Hostname the browser addressed, for tenant resolution.
pub(crate) fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn forward_with_bearer(mut req: Request, next: Next, access_token: &str) -> Response {
    req.headers_mut().remove(header::COOKIE);
    match HeaderValue::from_str(&format!("Bearer {access_token}")) {
        Ok(value) => {
            req.headers_mut().insert(header::AUTHORIZATION, value);
            next.run(req).await
        }
        Err(err) => {
            warn!(error = %err, "access token is not header-safe");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

fn unauthenticated(state: &GatewayState, jar: CookieJar) -> Response {
    let mut jar = jar;
    for cookie in state.lifecycle.cookie_codec().clear_all() {
        jar = jar.add(cookie);
    }
    (StatusCode::UNAUTHORIZED, jar).into_response()
}

fn apply_cookies(response: &mut Response, cookies: &[Cookie<'static>]) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, cookie = cookie.name(), "unrepresentable cookie"),
        }
    }
}
