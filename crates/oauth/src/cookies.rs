use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Access token cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "AT";
/// Refresh token cookie.
pub const REFRESH_TOKEN_COOKIE: &str = "RT";
/// ID token cookie.
pub const ID_TOKEN_COOKIE: &str = "IT";
/// CSRF-binding state for the authorization callback.
pub const STATE_COOKIE: &str = "OAUTH_STATE";
/// PKCE code verifier, held between login initiation and callback.
pub const PKCE_COOKIE: &str = "OAUTH_PKCE";
/// CSRF token issued by the frontend stack; cleared together with the
/// session so it cannot outlive it.
pub const CSRF_COOKIE: &str = "XSRF-TOKEN";

/// Every cookie name this service ever sets.
pub const SESSION_COOKIES: [&str; 6] = [
    ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
    ID_TOKEN_COOKIE,
    STATE_COOKIE,
    PKCE_COOKIE,
    CSRF_COOKIE,
];

/// Security attributes shared by every cookie the codec produces.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    /// Shared parent domain, when cookies must span subdomains.
    pub domain: Option<String>,
    /// `Secure` flag. Off only for non-TLS local development.
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            domain: None,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// Builds and expires the session cookie set. Produces descriptors only;
/// callers attach them to responses.
#[derive(Debug, Clone)]
pub struct CookieCodec {
    policy: CookiePolicy,
}

impl CookieCodec {
    pub fn new(policy: CookiePolicy) -> Self {
        Self { policy }
    }

    /// Issue an HttpOnly cookie scoped to "/" with the given lifetime.
    pub fn issue(&self, name: &str, value: &str, ttl_seconds: u64) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .http_only(true)
            .secure(self.policy.secure)
            .same_site(self.policy.same_site)
            .path("/")
            .max_age(Duration::seconds(ttl_seconds as i64));
        if let Some(domain) = self.policy.domain.as_deref()
            && !domain.is_empty()
        {
            builder = builder.domain(domain.to_string());
        }
        builder.build()
    }

    /// A deletion cookie: empty value, `Max-Age=0`.
    pub fn expire(&self, name: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), String::new()))
            .http_only(true)
            .secure(self.policy.secure)
            .same_site(self.policy.same_site)
            .path("/")
            .max_age(Duration::ZERO);
        if let Some(domain) = self.policy.domain.as_deref()
            && !domain.is_empty()
        {
            builder = builder.domain(domain.to_string());
        }
        builder.build()
    }

    /// Deletion cookies for the full session set.
    pub fn clear_all(&self) -> Vec<Cookie<'static>> {
        SESSION_COOKIES.iter().map(|name| self.expire(name)).collect()
    }
}
