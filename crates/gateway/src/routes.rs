use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{debug, warn};

use tollgate_oauth::AuthError;
use tollgate_oauth::cookies::{ID_TOKEN_COOKIE, PKCE_COOKIE, REFRESH_TOKEN_COOKIE, STATE_COOKIE};

use crate::relay::request_host;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub client: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// `POST /login[?client=admin|user]` — redirect the browser into the
/// provider's authorization endpoint, binding the round trip with
/// state/PKCE cookies.
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    match state
        .lifecycle
        .initiate_login(request_host(&headers), query.client.as_deref())
    {
        Ok(redirect) => {
            let mut jar = jar;
            for cookie in redirect.cookies {
                jar = jar.add(cookie);
            }
            (StatusCode::FOUND, jar, [(header::LOCATION, redirect.location)]).into_response()
        }
        Err(err) => failure(&state, jar, &err),
    }
}

/// `GET /callback?code&state` — exchange the authorization code and land
/// the browser on the tenant frontend with a full cookie session.
pub async fn callback(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let state_cookie = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let verifier_cookie = jar.get(PKCE_COOKIE).map(|c| c.value().to_string());

    match state
        .lifecycle
        .handle_callback(
            &query.code,
            &query.state,
            state_cookie.as_deref(),
            verifier_cookie.as_deref(),
            request_host(&headers),
        )
        .await
    {
        Ok(outcome) => {
            let mut jar = jar;
            for cookie in outcome.cookies {
                jar = jar.add(cookie);
            }
            (StatusCode::FOUND, jar, [(header::LOCATION, outcome.location)]).into_response()
        }
        Err(err) => failure(&state, jar, &err),
    }
}

/// `POST /refresh` — explicit, user-agent-triggered refresh. The silent
/// counterpart lives in the relay filter.
pub async fn refresh(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();

    match state
        .lifecycle
        .refresh_access_token(&token, request_host(&headers))
        .await
    {
        Ok(outcome) => {
            let mut jar = jar;
            for cookie in outcome.cookies {
                jar = jar.add(cookie);
            }
            (StatusCode::OK, jar).into_response()
        }
        Err(err) => failure(&state, jar, &err),
    }
}

/// `POST /logout` — clear the session and send the browser through the
/// provider's logout back to the tenant frontend.
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let id_token = jar.get(ID_TOKEN_COOKIE).map(|c| c.value().to_string());

    match state
        .lifecycle
        .logout(id_token.as_deref(), request_host(&headers))
        .await
    {
        Ok(outcome) => {
            let mut jar = jar;
            for cookie in outcome.cookies {
                jar = jar.add(cookie);
            }
            (StatusCode::FOUND, jar, [(header::LOCATION, outcome.location)]).into_response()
        }
        Err(err) => failure(&state, jar, &err),
    }
}

/// Terminal failure: the browser gets a bare status and a cleared session,
/// never the upstream error body.
fn failure(state: &GatewayState, jar: CookieJar, err: &AuthError) -> Response {
    let status = if err.is_unauthenticated() {
        debug!(error = %err, "auth request rejected");
        StatusCode::UNAUTHORIZED
    } else {
        warn!(error = %err, "auth request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let mut jar = jar;
    for cookie in state.lifecycle.cookie_codec().clear_all() {
        jar = jar.add(cookie);
    }
    (status, jar).into_response()
}
