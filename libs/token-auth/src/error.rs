use thiserror::Error;
use token_auth_http::HttpError;

use crate::hooks::HookError;

/// Errors returned by [`TokenProvider`](crate::TokenProvider) and
/// [`AuthSession`](crate::AuthSession).
///
/// Messages never contain the password or token value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// `logout()` was called on this session; the state is terminal.
    #[error("No HTTP requests can be made after logging out")]
    SessionClosed,

    /// The authentication service answered `401`.
    #[error("Unauthorized")]
    Unauthorized,

    /// The authentication service answered with a status other than `200`
    /// or `401`.
    #[error("Unknown error")]
    AuthenticationFailed { status: http::StatusCode },

    /// Transport failure, either on the authentication exchange or on the
    /// delegated request.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A payload builder or response parser failed.
    #[error(transparent)]
    Hook(HookError),

    /// Invalid session configuration.
    #[error("auth session config error: {0}")]
    Config(String),
}

impl AuthError {
    /// `true` for the credential-related failures (`Unauthorized` and
    /// `AuthenticationFailed`), as opposed to closed sessions, transport or
    /// hook problems.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::AuthenticationFailed { .. })
    }

    /// Status returned by the authentication service, if this error came
    /// from a rejected authentication exchange.
    #[must_use]
    pub fn auth_status(&self) -> Option<http::StatusCode> {
        match self {
            Self::Unauthorized => Some(http::StatusCode::UNAUTHORIZED),
            Self::AuthenticationFailed { status } => Some(*status),
            _ => None,
        }
    }
}
