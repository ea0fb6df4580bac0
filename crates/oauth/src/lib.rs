pub mod client;
pub mod cookies;
pub mod error;
pub mod lifecycle;
pub mod pkce;
pub mod types;

pub use client::{ClientConfig, ClientRegistry, Tenant};
pub use cookies::{CookieCodec, CookiePolicy};
pub use error::AuthError;
pub use lifecycle::TokenLifecycle;
pub use types::{ProviderConfig, TokenSet};
