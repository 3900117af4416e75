use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use token_auth_http::{
    HttpClient, HttpClientBuilder, HttpClientConfig, HttpResponse, RequestBuilder,
    TransportSecurity,
};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthSessionConfig;
use crate::error::AuthError;
use crate::hooks::{AuthPayloadBuilder, AuthResponseParser};
use crate::provider::TokenProvider;
use crate::secret::SecretString;
use crate::token::AUTHENTICATION_HEADER;

/// Request-issuing operations of an [`AuthSession`].
///
/// Only these go through the token lifecycle; everything else on the wrapped
/// client is reached via [`AuthSession::http_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// [`AuthSession::request`] with a caller-chosen method. Through
    /// [`AuthSession::verb`], which has no method to pass, it issues `GET`.
    Request,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Patch,
        Verb::Delete,
        Verb::Head,
        Verb::Options,
        Verb::Request,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::Head => "head",
            Verb::Options => "options",
            Verb::Request => "request",
        }
    }

    /// Fixed HTTP method of the verb; `None` for [`Verb::Request`].
    #[must_use]
    pub fn method(self) -> Option<Method> {
        match self {
            Verb::Get => Some(Method::GET),
            Verb::Post => Some(Method::POST),
            Verb::Put => Some(Method::PUT),
            Verb::Patch => Some(Method::PATCH),
            Verb::Delete => Some(Method::DELETE),
            Verb::Head => Some(Method::HEAD),
            Verb::Options => Some(Method::OPTIONS),
            Verb::Request => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP client that authenticates on demand and stamps
/// `Authentication: Token <value>` on every request.
///
/// Clones share the same [`TokenProvider`], so logging out through one clone
/// closes all of them.
///
/// ```ignore
/// let session = token_auth::auth_session("user", "pass", "https://auth.example.com/login")?;
/// let resp = session.get("https://api.example.com/items").send().await?;
/// session.logout().await;
/// ```
#[derive(Clone)]
pub struct AuthSession {
    provider: Arc<TokenProvider>,
    client: HttpClient,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("provider", &self.provider)
            .field("client", &self.client)
            .finish()
    }
}

/// Create a session with default transport settings and the system clock.
///
/// Performs no network I/O; the first request authenticates. An `http://`
/// auth URL switches the transport to
/// [`TransportSecurity::AllowInsecureHttp`] so the session can reach it.
///
/// # Errors
///
/// [`AuthError::Config`] if `auth_url` does not parse, [`AuthError::Http`] if
/// the transport cannot be built.
pub fn auth_session(
    username: impl Into<String>,
    password: impl Into<String>,
    auth_url: &str,
) -> Result<AuthSession, AuthError> {
    let auth_url = Url::parse(auth_url)
        .map_err(|e| AuthError::Config(format!("invalid auth_url '{auth_url}': {e}")))?;

    let mut http_config = HttpClientConfig::default();
    if auth_url.scheme() == "http" {
        tracing::warn!(
            url = %auth_url,
            "plain-HTTP auth URL - credentials and tokens travel unencrypted"
        );
        http_config.transport = TransportSecurity::AllowInsecureHttp;
    }

    AuthSession::builder(username, password, auth_url)
        .http_config(http_config)
        .build()
}

impl AuthSession {
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
        auth_url: Url,
    ) -> AuthSessionBuilder {
        AuthSessionBuilder {
            username: username.into(),
            password: SecretString::new(password),
            auth_url,
            http_config: None,
            clock: None,
            payload_builder: None,
            response_parser: None,
        }
    }

    /// Build a session from deserialized configuration.
    ///
    /// # Errors
    ///
    /// Same as [`AuthSessionBuilder::build`].
    pub fn from_config(
        config: &AuthSessionConfig,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AuthError> {
        Self::builder(username, password, config.auth_url.clone())
            .http_config(config.http_config())
            .build()
    }

    pub fn get(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Get, self.client.get(url))
    }

    pub fn post(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Post, self.client.post(url))
    }

    pub fn put(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Put, self.client.put(url))
    }

    pub fn patch(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Patch, self.client.patch(url))
    }

    pub fn delete(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Delete, self.client.delete(url))
    }

    pub fn head(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Head, self.client.head(url))
    }

    pub fn options(&self, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Options, self.client.options(url))
    }

    pub fn request(&self, method: Method, url: &str) -> AuthenticatedRequest {
        self.wrap(Verb::Request, self.client.request(method, url))
    }

    /// Start the request for `verb`.
    ///
    /// [`Verb::Request`] carries no method of its own and issues a `GET` here;
    /// use [`request`](Self::request) to pick one.
    pub fn verb(&self, verb: Verb, url: &str) -> AuthenticatedRequest {
        let method = verb.method().unwrap_or(Method::GET);
        self.wrap(verb, self.client.request(method, url))
    }

    fn wrap(&self, verb: Verb, inner: RequestBuilder) -> AuthenticatedRequest {
        AuthenticatedRequest {
            provider: Arc::clone(&self.provider),
            verb,
            inner,
        }
    }

    /// Close the session. Every later request fails with
    /// [`AuthError::SessionClosed`].
    pub async fn logout(&self) {
        self.provider.logout().await;
    }

    pub fn set_payload_builder(&self, builder: impl AuthPayloadBuilder + 'static) {
        self.provider.set_payload_builder(builder);
    }

    pub fn set_response_parser(&self, parser: impl AuthResponseParser + 'static) {
        self.provider.set_response_parser(parser);
    }

    /// The wrapped client, untouched by the token logic.
    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.client
    }

    #[must_use]
    pub fn provider(&self) -> &TokenProvider {
        &self.provider
    }
}

/// Builder for [`AuthSession`].
#[must_use = "AuthSessionBuilder does nothing until .build() is called"]
pub struct AuthSessionBuilder {
    username: String,
    password: SecretString,
    auth_url: Url,
    http_config: Option<HttpClientConfig>,
    clock: Option<Arc<dyn Clock>>,
    payload_builder: Option<Arc<dyn AuthPayloadBuilder>>,
    response_parser: Option<Arc<dyn AuthResponseParser>>,
}

impl fmt::Debug for AuthSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSessionBuilder")
            .field("auth_url", &self.auth_url.as_str())
            .field("http_config", &self.http_config)
            .finish_non_exhaustive()
    }
}

impl AuthSessionBuilder {
    /// Transport settings for both the authentication exchange and the
    /// wrapped requests. Defaults to [`HttpClientConfig::default`].
    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = Some(config);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn payload_builder(mut self, builder: impl AuthPayloadBuilder + 'static) -> Self {
        self.payload_builder = Some(Arc::new(builder));
        self
    }

    pub fn response_parser(mut self, parser: impl AuthResponseParser + 'static) -> Self {
        self.response_parser = Some(Arc::new(parser));
        self
    }

    /// # Errors
    ///
    /// [`AuthError::Http`] if the transport cannot be built (TLS setup or an
    /// invalid User-Agent).
    pub fn build(self) -> Result<AuthSession, AuthError> {
        let client =
            HttpClientBuilder::with_config(self.http_config.unwrap_or_default()).build()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let provider = TokenProvider::new(
            self.username,
            self.password.expose(),
            self.auth_url,
            client.clone(),
            clock,
        );
        provider.install_hooks(self.payload_builder, self.response_parser);

        Ok(AuthSession {
            provider: Arc::new(provider),
            client,
        })
    }
}

/// Request started on an [`AuthSession`].
///
/// Nothing happens until [`send`](Self::send), which authenticates first if
/// needed.
#[must_use = "AuthenticatedRequest does nothing until .send() is called"]
pub struct AuthenticatedRequest {
    provider: Arc<TokenProvider>,
    verb: Verb,
    inner: RequestBuilder,
}

impl fmt::Debug for AuthenticatedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedRequest")
            .field("verb", &self.verb)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedRequest {
    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.inner = self.inner.headers(headers);
        self
    }

    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.inner = self.inner.header_value(name, value);
        self
    }

    /// # Errors
    ///
    /// [`AuthError::Http`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, AuthError> {
        self.inner = self.inner.json(body)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`AuthError::Http`] if encoding fails.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, AuthError> {
        self.inner = self.inner.form(fields)?;
        Ok(self)
    }

    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.inner = self.inner.body_bytes(body);
        self
    }

    pub fn body_string(mut self, body: String) -> Self {
        self.inner = self.inner.body_string(body);
        self
    }

    /// Authenticate if needed, attach the token and send.
    ///
    /// The response is returned whatever its status; only the authentication
    /// exchange has its status interpreted.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] from the token lifecycle, or [`AuthError::Http`] from
    /// the request itself.
    pub async fn send(self) -> Result<HttpResponse, AuthError> {
        let header = self.provider.authorization_header().await?;

        tracing::trace!(verb = %self.verb, method = %self.inner.method(), "sending authenticated request");

        Ok(self
            .inner
            .header_value(AUTHENTICATION_HEADER, header)
            .send()
            .await?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn verb_list_is_fixed() {
        assert_eq!(Verb::ALL.len(), 8);
        let names: Vec<_> = Verb::ALL.iter().map(|v| v.as_str()).collect();
        assert_eq!(
            names,
            ["get", "post", "put", "patch", "delete", "head", "options", "request"]
        );
        assert_eq!(Verb::Request.method(), None);
        assert_eq!(Verb::Head.method(), Some(Method::HEAD));
    }

    #[test]
    fn auth_session_is_lazy_and_needs_no_runtime() {
        let session = auth_session("u", "p", "https://auth.example.com/login").unwrap();
        assert_eq!(
            session.provider().auth_url().as_str(),
            "https://auth.example.com/login"
        );
    }

    #[test]
    fn auth_session_rejects_bad_url() {
        let err = auth_session("u", "p", "not a url").unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn requests_carry_their_verb() {
        let session = auth_session("u", "p", "https://auth.example.com/login").unwrap();
        let url = "https://api.example.com/x";

        assert_eq!(session.get(url).verb(), Verb::Get);
        assert_eq!(session.options(url).verb(), Verb::Options);
        let req = session.request(Method::TRACE, url);
        assert_eq!(req.verb(), Verb::Request);
        assert_eq!(req.method(), &Method::TRACE);

        for verb in Verb::ALL {
            let req = session.verb(verb, url);
            assert_eq!(req.verb(), verb);
            assert_eq!(req.method(), &verb.method().unwrap_or(Method::GET));
        }
        assert_eq!(session.verb(Verb::Request, url).method(), &Method::GET);
    }

    #[test]
    fn auth_session_transport_follows_auth_url_scheme() {
        let tls = auth_session("u", "p", "https://auth.example.com/login").unwrap();
        assert_eq!(
            tls.http_client().transport_security(),
            TransportSecurity::TlsOnly
        );

        let plain = auth_session("u", "p", "http://127.0.0.1:8080/login").unwrap();
        assert_eq!(
            plain.http_client().transport_security(),
            TransportSecurity::AllowInsecureHttp
        );
    }

    #[test]
    fn passthrough_exposes_wrapped_client() {
        let session = AuthSession::builder(
            "u",
            "p",
            Url::parse("https://auth.example.com/login").unwrap(),
        )
        .http_config(HttpClientConfig {
            user_agent: "sessions/1.0".to_owned(),
            ..HttpClientConfig::default()
        })
        .build()
        .unwrap();

        assert_eq!(session.http_client().user_agent(), "sessions/1.0");
    }

    #[test]
    fn debug_does_not_leak_password() {
        let builder = AuthSession::builder(
            "u",
            "hunter2",
            Url::parse("https://auth.example.com/login").unwrap(),
        );
        assert!(!format!("{builder:?}").contains("hunter2"));
    }
}
