//! Settings for the tollgate gateway: a TOML file plus environment
//! overrides for secrets.

use std::path::Path;

use anyhow::Context;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "TOLLGATE_CONFIG";
/// Default settings file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tollgate.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub clients: ClientsSettings,
    #[serde(default)]
    pub cookies: CookieSettings,
    /// Prefix-routed upstream table for the reverse proxy.
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteSettings>,
    /// Extra path prefixes the relay filter lets through untouched,
    /// alongside the built-in auth endpoints.
    #[serde(default)]
    pub public_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// Base URL under which the provider's /auth, /token and /logout live.
    pub base_url: String,
    /// The redirect URI registered with the provider.
    pub callback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientsSettings {
    pub admin: ClientSettings,
    pub user: ClientSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieSettings {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSitePolicy,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            secure: true,
            same_site: SameSitePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteSettings {
    /// Request path prefix, e.g. `/api/v1/claims`.
    pub prefix: String,
    /// Upstream base URL the prefix forwards to.
    pub upstream: String,
}

impl Settings {
    /// Load settings from `path`, then apply environment overrides for the
    /// client secrets (`TOLLGATE_ADMIN_CLIENT_SECRET`,
    /// `TOLLGATE_USER_CLIENT_SECRET`).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let mut settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        settings.apply_env_overrides();
        settings.validate()?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Resolve the settings path: explicit argument, then `TOLLGATE_CONFIG`,
    /// then `tollgate.toml` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> std::path::PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return path.into();
        }
        DEFAULT_CONFIG_FILE.into()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("TOLLGATE_ADMIN_CLIENT_SECRET") {
            self.clients.admin.client_secret = Some(SecretString::new(secret));
        }
        if let Ok(secret) = std::env::var("TOLLGATE_USER_CLIENT_SECRET") {
            self.clients.user.client_secret = Some(SecretString::new(secret));
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, client) in [("admin", &self.clients.admin), ("user", &self.clients.user)] {
            if client.client_secret.is_none() {
                anyhow::bail!(
                    "no client secret for the {name} client: set it in the settings file or \
                     via TOLLGATE_{}_CLIENT_SECRET",
                    name.to_uppercase()
                );
            }
        }
        Ok(())
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8903
}

fn default_true() -> bool {
    true
}
