use anyhow::Context;
use axum_extra::extract::cookie::SameSite;
use tollgate_config::{SameSitePolicy, Settings};
use tollgate_oauth::{
    ClientConfig, ClientRegistry, CookieCodec, CookiePolicy, ProviderConfig, TokenLifecycle,
};

use crate::proxy::ProxyTable;
use crate::singleflight::RefreshCoordinator;

/// Paths served by this gateway itself; the relay filter lets them through
/// untouched.
const AUTH_PATHS: [&str; 4] = ["/login", "/callback", "/refresh", "/logout"];

/// Everything the request handlers share.
pub struct GatewayState {
    pub lifecycle: TokenLifecycle,
    pub refresh: RefreshCoordinator,
    pub proxy: ProxyTable,
    /// HTTP client used for forwarding to downstream services.
    pub upstream_http: reqwest::Client,
    public_paths: Vec<String>,
}

impl GatewayState {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let clients = ClientRegistry::new(
            client_config(&settings.clients.admin).context("admin client")?,
            client_config(&settings.clients.user).context("user client")?,
        );

        let cookies = CookieCodec::new(CookiePolicy {
            domain: settings.cookies.domain.clone(),
            secure: settings.cookies.secure,
            same_site: match settings.cookies.same_site {
                SameSitePolicy::Strict => SameSite::Strict,
                SameSitePolicy::Lax => SameSite::Lax,
                SameSitePolicy::None => SameSite::None,
            },
        });

        let provider = ProviderConfig {
            base_url: settings.provider.base_url.clone(),
            callback_url: settings.provider.callback_url.clone(),
        };

        let mut public_paths: Vec<String> =
            AUTH_PATHS.iter().map(|p| p.to_string()).collect();
        public_paths.extend(settings.public_paths.iter().cloned());

        Ok(Self {
            lifecycle: TokenLifecycle::new(reqwest::Client::new(), provider, clients, cookies),
            refresh: RefreshCoordinator::new(),
            proxy: ProxyTable::from_settings(&settings.routes),
            upstream_http: reqwest::Client::new(),
            public_paths,
        })
    }

    /// Prefix match against the allow-list, the way the original gateway
    /// matched its public endpoints.
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

fn client_config(settings: &tollgate_config::ClientSettings) -> anyhow::Result<ClientConfig> {
    Ok(ClientConfig {
        client_id: settings.client_id.clone(),
        client_secret: settings
            .client_secret
            .clone()
            .context("client secret missing")?,
        frontend_url: settings.frontend_url.clone(),
    })
}
