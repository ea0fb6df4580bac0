use serde::{Deserialize, Serialize};

/// Identity provider endpoints and the registered callback.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL under which `/auth`, `/token` and `/logout` live.
    pub base_url: String,
    /// The redirect URI registered with the provider.
    pub callback_url: String,
}

impl ProviderConfig {
    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.base_url.trim_end_matches('/'))
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.base_url.trim_end_matches('/'))
    }

    pub fn logout_url(&self) -> String {
        format!("{}/logout", self.base_url.trim_end_matches('/'))
    }
}

/// Token response from the provider's `/token` endpoint, for both the
/// authorization-code and refresh-token grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// Access (and id) token lifetime in seconds.
    pub expires_in: Option<u64>,
    pub refresh_expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenSet {
    /// Whether the set carries a usable access token.
    pub fn has_access_token(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}
