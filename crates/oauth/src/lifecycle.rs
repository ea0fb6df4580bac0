use axum_extra::extract::cookie::Cookie;
use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

use crate::client::ClientRegistry;
use crate::cookies::{
    ACCESS_TOKEN_COOKIE, CookieCodec, ID_TOKEN_COOKIE, PKCE_COOKIE, REFRESH_TOKEN_COOKIE,
    STATE_COOKIE,
};
use crate::error::AuthError;
use crate::pkce;
use crate::types::{ProviderConfig, TokenSet};

/// Scope requested at login initiation.
const LOGIN_SCOPE: &str = "openid profile email";

/// State and PKCE cookies live long enough to complete one round trip
/// through the provider.
const LOGIN_SESSION_TTL: u64 = 300;

/// Cookie lifetimes when the provider omits the expiry fields.
const DEFAULT_ACCESS_TTL: u64 = 20;
const DEFAULT_REFRESH_TTL: u64 = 3600;
const DEFAULT_ID_TTL: u64 = 60;

/// Result of a login initiation: where to send the browser, and the
/// state/PKCE cookies binding the eventual callback to this initiation.
#[derive(Debug)]
pub struct LoginRedirect {
    pub location: String,
    pub client_id: String,
    pub cookies: Vec<Cookie<'static>>,
}

/// Result of a successful code exchange.
#[derive(Debug)]
pub struct CallbackOutcome {
    /// The resolved tenant's frontend.
    pub location: String,
    pub cookies: Vec<Cookie<'static>>,
}

/// Result of a successful refresh exchange.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub tokens: TokenSet,
    pub cookies: Vec<Cookie<'static>>,
}

/// Result of a logout. Always produced, whatever the provider did.
#[derive(Debug)]
pub struct LogoutOutcome {
    pub location: String,
    pub cookies: Vec<Cookie<'static>>,
}

/// The four lifecycle operations against the identity provider.
///
/// Stateless: every call resolves its tenant from the request and talks to
/// the provider's endpoints directly. Cookie descriptors are returned, never
/// applied — callers own the response.
#[derive(Debug, Clone)]
pub struct TokenLifecycle {
    http: reqwest::Client,
    provider: ProviderConfig,
    clients: ClientRegistry,
    cookies: CookieCodec,
}

impl TokenLifecycle {
    pub fn new(
        http: reqwest::Client,
        provider: ProviderConfig,
        clients: ClientRegistry,
        cookies: CookieCodec,
    ) -> Self {
        Self {
            http,
            provider,
            clients,
            cookies,
        }
    }

    pub fn cookie_codec(&self) -> &CookieCodec {
        &self.cookies
    }

    /// Begin an authorization-code-with-PKCE login: generate state and
    /// verifier, and point the browser at the provider's `/auth` endpoint.
    pub fn initiate_login(
        &self,
        host: &str,
        client_param: Option<&str>,
    ) -> Result<LoginRedirect, AuthError> {
        let client = self.clients.resolve(host, client_param);

        let state = pkce::generate_state();
        let verifier = pkce::generate_code_verifier();
        let challenge = pkce::code_challenge(&verifier);

        let mut location = Url::parse(&self.provider.auth_url())?;
        location
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &client.client_id)
            .append_pair("scope", LOGIN_SCOPE)
            .append_pair("redirect_uri", &self.provider.callback_url)
            .append_pair("state", &state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        debug!(client_id = %client.client_id, "initiating login");

        Ok(LoginRedirect {
            location: location.into(),
            client_id: client.client_id.clone(),
            cookies: vec![
                self.cookies.issue(STATE_COOKIE, &state, LOGIN_SESSION_TTL),
                self.cookies.issue(PKCE_COOKIE, &verifier, LOGIN_SESSION_TTL),
            ],
        })
    }

    /// Exchange the authorization code after validating the state binding.
    ///
    /// The state cookie is consumed exactly once: absent or mismatched state
    /// fails before any upstream call is made.
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
        state_cookie: Option<&str>,
        verifier_cookie: Option<&str>,
        host: &str,
    ) -> Result<CallbackOutcome, AuthError> {
        // Byte-exact match; cookie loss and forgery are rejected uniformly.
        if state_cookie != Some(state) {
            return Err(AuthError::StateMismatch);
        }

        let client = self.clients.resolve(host, None);

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("client_id", client.client_id.clone()),
            (
                "client_secret",
                client.client_secret.expose_secret().to_string(),
            ),
            ("redirect_uri", self.provider.callback_url.clone()),
        ];
        if let Some(verifier) = verifier_cookie
            && !verifier.trim().is_empty()
        {
            form.push(("code_verifier", verifier.to_string()));
        }

        let tokens = self.exchange(&form).await?;

        let mut cookies = self.token_cookies(&tokens);
        cookies.push(self.cookies.expire(STATE_COOKIE));
        cookies.push(self.cookies.expire(PKCE_COOKIE));

        debug!(client_id = %client.client_id, "code exchange complete");

        Ok(CallbackOutcome {
            location: client.frontend_url.clone(),
            cookies,
        })
    }

    /// Exchange a refresh token for a fresh token set.
    ///
    /// A blank token short-circuits without an upstream call; a 2xx answer
    /// that carries no access token is treated as a rejection.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        host: &str,
    ) -> Result<RefreshOutcome, AuthError> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let client = self.clients.resolve(host, None);

        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", client.client_id.clone()),
            (
                "client_secret",
                client.client_secret.expose_secret().to_string(),
            ),
        ];

        let tokens = self.exchange(&form).await?;
        if !tokens.has_access_token() {
            return Err(AuthError::RefreshRejected);
        }

        let cookies = self.token_cookies(&tokens);
        let access_token = tokens.access_token.clone().unwrap_or_default();

        debug!(client_id = %client.client_id, "refresh exchange complete");

        Ok(RefreshOutcome {
            access_token,
            tokens,
            cookies,
        })
    }

    /// End the session. The provider's logout endpoint is called
    /// best-effort; the local session is cleared no matter what.
    pub async fn logout(
        &self,
        id_token: Option<&str>,
        host: &str,
    ) -> Result<LogoutOutcome, AuthError> {
        let client = self.clients.resolve(host, None);

        let mut logout_url = Url::parse(&self.provider.logout_url())?;
        logout_url
            .query_pairs_mut()
            .append_pair("post_logout_redirect_uri", &client.frontend_url)
            .append_pair("id_token_hint", id_token.unwrap_or(""))
            .append_pair("client_id", &client.client_id);

        match self.http.get(logout_url.as_str()).send().await {
            Ok(response) if !response.status().is_success() => {
                debug!(status = %response.status(), "provider logout returned non-success");
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "provider logout unreachable");
            }
        }

        Ok(LogoutOutcome {
            location: client.frontend_url.clone(),
            cookies: self.cookies.clear_all(),
        })
    }

    async fn exchange(&self, form: &[(&str, String)]) -> Result<TokenSet, AuthError> {
        let response = self
            .http
            .post(self.provider.token_url())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::ExchangeRejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(AuthError::MalformedResponse)
    }

    /// Cookie descriptors for a token set. Lifetimes follow the provider's
    /// expiry fields, with short fallbacks when absent.
    fn token_cookies(&self, tokens: &TokenSet) -> Vec<Cookie<'static>> {
        let mut out = Vec::with_capacity(3);
        if let Some(access) = tokens.access_token.as_deref() {
            out.push(self.cookies.issue(
                ACCESS_TOKEN_COOKIE,
                access,
                tokens.expires_in.unwrap_or(DEFAULT_ACCESS_TTL),
            ));
        }
        if let Some(refresh) = tokens.refresh_token.as_deref() {
            out.push(self.cookies.issue(
                REFRESH_TOKEN_COOKIE,
                refresh,
                tokens.refresh_expires_in.unwrap_or(DEFAULT_REFRESH_TTL),
            ));
        }
        if let Some(id) = tokens.id_token.as_deref() {
            out.push(self.cookies.issue(
                ID_TOKEN_COOKIE,
                id,
                tokens.expires_in.unwrap_or(DEFAULT_ID_TTL),
            ));
        }
        out
    }
}
