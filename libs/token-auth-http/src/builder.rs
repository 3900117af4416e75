use crate::client::{ClientService, HttpClient};
use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::UserAgentLayer;
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};

/// Assembles an [`HttpClient`] from an [`HttpClientConfig`].
///
/// Building opens no connections and needs no runtime; the first request does.
#[derive(Debug, Clone, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        if transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                target: "token_auth_http::security",
                "plain HTTP enabled; requests will not be encrypted"
            );
        }
        self.config.transport = transport;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, tls_roots: TlsRootConfig) -> Self {
        self.config.tls_roots = tls_roots;
        self
    }

    /// Shorthand for `.transport(TransportSecurity::AllowInsecureHttp)`.
    #[must_use]
    pub fn allow_insecure_http(self) -> Self {
        self.transport(TransportSecurity::AllowInsecureHttp)
    }

    /// Layers, outermost first: timeout, user agent, hyper.
    ///
    /// # Errors
    ///
    /// `HttpError::Tls` if the root store cannot be loaded,
    /// `HttpError::InvalidHeaderValue` for an unusable user agent.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let timeout = self.config.request_timeout;
        let user_agent = UserAgentLayer::try_new(&self.config.user_agent)?;
        let hyper_client = self.hyper_client()?;

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(user_agent)
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));
        let service: ClientService = BoxCloneSyncService::new(service);

        tracing::debug!(?timeout, transport = ?self.config.transport, "http client ready");

        Ok(HttpClient {
            service,
            config: Arc::new(self.config),
        })
    }

    fn hyper_client(
        &self,
    ) -> Result<Client<tls::HttpsConnector, Full<Bytes>>, HttpError> {
        let connector = tls::build_https_connector(self.config.tls_roots, self.config.transport)?;

        let mut builder = Client::builder(TokioExecutor::new());
        // idle timeouts only fire with a pool timer installed
        builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);
        if let Some(idle) = self.config.pool_idle_timeout {
            builder.pool_idle_timeout(idle);
        }
        Ok(builder.build(connector))
    }
}

/// Elapsed becomes `Timeout`; an `HttpError` from an inner layer is unboxed.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}
