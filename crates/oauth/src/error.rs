use thiserror::Error;

/// Failures of the token lifecycle operations.
///
/// The split mirrors how callers must answer the browser: everything that
/// amounts to a missing or invalid credential maps to 401 with the session
/// cookies cleared; only unexpected transport or parse failures surface as
/// 500-class.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Callback state cookie absent or not byte-equal to the query state.
    #[error("callback state cookie missing or mismatched")]
    StateMismatch,

    /// No credential present; no upstream call was attempted.
    #[error("no credential available")]
    MissingCredential,

    /// The provider answered the exchange with a non-success status.
    #[error("identity provider rejected the exchange with status {status}")]
    ExchangeRejected { status: u16 },

    /// A refresh exchange succeeded upstream but yielded no usable access
    /// token.
    #[error("refresh exchange returned no access token")]
    RefreshRejected,

    /// The provider's 2xx response body was not a valid token set.
    #[error("malformed token response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// Could not reach the provider at all.
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// A provider endpoint URL from configuration failed to parse.
    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// True when the failure means "the browser holds no valid session"
    /// rather than "something broke".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::StateMismatch
                | Self::MissingCredential
                | Self::ExchangeRejected { .. }
                | Self::RefreshRejected
        )
    }
}
