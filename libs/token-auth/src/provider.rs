use std::fmt;
use std::sync::Arc;

use http::{HeaderValue, StatusCode};
use parking_lot::RwLock;
use time::OffsetDateTime;
use token_auth_http::{HttpClient, HttpError};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::Clock;
use crate::error::AuthError;
use crate::hooks::{
    AuthPayloadBuilder, AuthResponseParser, DefaultPayloadBuilder, DefaultResponseParser,
};
use crate::secret::SecretString;
use crate::token::CachedToken;

#[derive(Zeroize, ZeroizeOnDrop)]
struct Credentials {
    username: String,
    password: SecretString,
}

struct ProviderState {
    credentials: Option<Credentials>,
    token: Option<CachedToken>,
    logged_out: bool,
}

/// Token lifecycle of one session.
///
/// Authenticates lazily, caches the token until it is within
/// [`VALIDITY_MARGIN`](crate::VALIDITY_MARGIN) of expiry and refuses all
/// further work after [`logout`](Self::logout).
///
/// The validity check, the authentication round-trip and the token read run
/// under one async lock, so concurrent callers that find the token stale
/// trigger a single authentication request between them.
pub struct TokenProvider {
    auth_url: Url,
    client: HttpClient,
    clock: Arc<dyn Clock>,
    payload_builder: RwLock<Arc<dyn AuthPayloadBuilder>>,
    response_parser: RwLock<Arc<dyn AuthResponseParser>>,
    state: tokio::sync::Mutex<ProviderState>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("auth_url", &self.auth_url.as_str())
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Create a provider. No network I/O happens until a token is needed.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        auth_url: Url,
        client: HttpClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auth_url,
            client,
            clock,
            payload_builder: RwLock::new(Arc::new(DefaultPayloadBuilder)),
            response_parser: RwLock::new(Arc::new(DefaultResponseParser)),
            state: tokio::sync::Mutex::new(ProviderState {
                credentials: Some(Credentials {
                    username: username.into(),
                    password: SecretString::new(password),
                }),
                token: None,
                logged_out: false,
            }),
        }
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Make sure a valid token is cached, authenticating if it is missing or
    /// about to expire.
    ///
    /// # Errors
    ///
    /// [`AuthError::SessionClosed`] after logout (checked first), otherwise
    /// any error from [`authenticate`](Self::authenticate).
    pub async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        self.ensure_valid(&mut state).await.map(|_| ())
    }

    /// Authenticate now, replacing the cached token on success.
    ///
    /// On failure the previously cached token (if any) is left untouched.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionClosed`] after logout
    /// - [`AuthError::Unauthorized`] if the service answers `401`
    /// - [`AuthError::AuthenticationFailed`] for any other status but `200`
    /// - [`AuthError::Http`] on transport failure
    /// - [`AuthError::Hook`] if the payload builder or response parser fails
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        if state.logged_out {
            return Err(AuthError::SessionClosed);
        }
        let token = self.fetch_token(&state).await?;
        state.token = Some(token);
        Ok(())
    }

    /// Value of the `Authentication` header for the next request.
    ///
    /// Check, refresh and read happen under the state lock.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_authenticated`](Self::ensure_authenticated), plus
    /// [`AuthError::Http`] if the token cannot be carried in a header.
    pub async fn authorization_header(&self) -> Result<HeaderValue, AuthError> {
        let mut state = self.state.lock().await;
        let token = self.ensure_valid(&mut state).await?;
        token
            .header_value()
            .map_err(|e| AuthError::Http(HttpError::InvalidHeaderValue(e)))
    }

    /// Forget credentials and token and close the session for good.
    ///
    /// Idempotent. Waits for an in-flight authentication to finish, so no
    /// caller observes a half-cleared state.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if !state.logged_out {
            tracing::info!(url = %self.auth_url, "auth session logged out");
        }
        state.credentials = None;
        state.token = None;
        state.logged_out = true;
    }

    /// Replace the payload builder used by the next authentication.
    pub fn set_payload_builder(&self, builder: impl AuthPayloadBuilder + 'static) {
        *self.payload_builder.write() = Arc::new(builder);
    }

    /// Replace the response parser used by the next authentication.
    pub fn set_response_parser(&self, parser: impl AuthResponseParser + 'static) {
        *self.response_parser.write() = Arc::new(parser);
    }

    pub(crate) fn install_hooks(
        &self,
        builder: Option<Arc<dyn AuthPayloadBuilder>>,
        parser: Option<Arc<dyn AuthResponseParser>>,
    ) {
        if let Some(builder) = builder {
            *self.payload_builder.write() = builder;
        }
        if let Some(parser) = parser {
            *self.response_parser.write() = parser;
        }
    }

    pub async fn is_logged_out(&self) -> bool {
        self.state.lock().await.logged_out
    }

    pub async fn has_credentials(&self) -> bool {
        self.state.lock().await.credentials.is_some()
    }

    /// Whether a cached token would be used without re-authenticating.
    pub async fn has_valid_token(&self) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .await
            .token
            .as_ref()
            .is_some_and(|token| token.is_valid_at(now))
    }

    /// Expiry of the cached token, if any.
    pub async fn token_expires_at(&self) -> Option<OffsetDateTime> {
        self.state
            .lock()
            .await
            .token
            .as_ref()
            .map(CachedToken::expires_at)
    }

    async fn ensure_valid<'s>(
        &self,
        state: &'s mut ProviderState,
    ) -> Result<&'s CachedToken, AuthError> {
        if state.logged_out {
            return Err(AuthError::SessionClosed);
        }

        let now = self.clock.now();
        let token = match state.token.take() {
            Some(token) if token.is_valid_at(now) => token,
            previous => match self.fetch_token(state).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    state.token = previous;
                    return Err(e);
                }
            },
        };
        Ok(state.token.insert(token))
    }

    /// One authentication round-trip. Leaves `state` untouched.
    async fn fetch_token(&self, state: &ProviderState) -> Result<CachedToken, AuthError> {
        let Some(credentials) = state.credentials.as_ref() else {
            return Err(AuthError::SessionClosed);
        };

        let builder = Arc::clone(&*self.payload_builder.read());
        let payload = builder
            .build_auth_payload(&credentials.username, credentials.password.expose())
            .map_err(AuthError::Hook)?;

        tracing::debug!(url = %self.auth_url, "authenticating");

        let response = self
            .client
            .post(self.auth_url.as_str())
            .json(&payload)?
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %self.auth_url, status = status.as_u16(), "authentication rejected");
            return Err(AuthError::Unauthorized);
        }
        if status != StatusCode::OK {
            tracing::warn!(url = %self.auth_url, status = status.as_u16(), "authentication failed");
            return Err(AuthError::AuthenticationFailed { status });
        }

        let body = response.bytes().await?;
        let received_at = self.clock.now();

        let parser = Arc::clone(&*self.response_parser.read());
        let grant = parser
            .parse_auth_response(&String::from_utf8_lossy(&body))
            .map_err(AuthError::Hook)?;

        let expires_at = received_at.checked_add(grant.expires_in).ok_or_else(|| {
            AuthError::Hook(format!("expires_in out of range: {}", grant.expires_in).into())
        })?;

        tracing::debug!(
            url = %self.auth_url,
            expires_in = grant.expires_in.whole_seconds(),
            "authenticated"
        );

        Ok(CachedToken::new(SecretString::new(grant.token), expires_at))
    }
}
