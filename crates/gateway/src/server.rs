use std::sync::Arc;

use {
    axum::{
        Router, middleware,
        routing::{get, post},
    },
    tower_http::trace::TraceLayer,
    tracing::info,
};

use tollgate_config::Settings;

use crate::{proxy, relay, routes, state::GatewayState};

/// Assemble the full router: auth endpoints, relay filter, proxy fallback.
pub fn build_router(settings: &Settings) -> anyhow::Result<Router> {
    let state = Arc::new(GatewayState::from_settings(settings)?);

    Ok(Router::new()
        .route("/login", post(routes::login))
        .route("/callback", get(routes::callback))
        .route("/refresh", post(routes::refresh))
        .route("/logout", post(routes::logout))
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            relay::token_relay,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind and serve until shutdown.
pub async fn start_gateway(settings: Settings) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let router = build_router(&settings)?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}
