use crate::builder::HttpClientBuilder;
use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use std::sync::Arc;
use std::time::Duration;
use tower::util::BoxCloneSyncService;

/// Type-erased middleware stack shared by all clones of a client
pub type ClientService = BoxCloneSyncService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

/// Plain HTTP client: a tower stack of timeout and User-Agent over hyper.
///
/// Clones share one connection pool and are cheap to hand to tasks.
/// Statuses are never interpreted here; every response comes back as `Ok`.
///
/// ```ignore
/// let client = HttpClient::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// let resp = client.get("https://api.example.com/health").send().await?;
/// assert!(resp.status().is_success());
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: ClientService,
    pub(crate) config: Arc<HttpClientConfig>,
}

impl HttpClient {
    /// Client with [`HttpClientConfig::default`].
    ///
    /// # Errors
    ///
    /// `HttpError::Tls` if the root store cannot be loaded.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// URLs must be absolute. A relative URL fails at `send()` with
    /// [`HttpError::InvalidUri`]; `http://` needs
    /// [`TransportSecurity::AllowInsecureHttp`].
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: &str) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    pub fn options(&self, url: &str) -> RequestBuilder {
        self.request(Method::OPTIONS, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.config.max_body_size,
            self.config.transport,
            method,
            url.to_owned(),
        )
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Default User-Agent sent on outbound requests
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Per-request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// Maximum response body size enforced by the body readers
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.config.max_body_size
    }

    /// Transport security mode
    #[must_use]
    pub fn transport_security(&self) -> TransportSecurity {
        self.config.transport
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::InvalidUriKind;
    use http::Method;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client() -> HttpClient {
        HttpClientBuilder::new()
            .allow_insecure_http()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/test");
            then.status(200).json_body(json!({"success": true}));
        });

        let client = test_client();
        let url = format!("{}/test", server.base_url());
        let resp = client.get(&url).send().await.unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn every_verb_reaches_server() {
        let server = MockServer::start();
        let client = test_client();
        let url = format!("{}/resource", server.base_url());

        let cases = [
            (Method::GET, GET),
            (Method::POST, POST),
            (Method::PUT, PUT),
            (Method::PATCH, PATCH),
            (Method::DELETE, DELETE),
            (Method::HEAD, httpmock::Method::HEAD),
            (Method::OPTIONS, OPTIONS),
        ];

        for (method, mock_method) in cases {
            let mut mock = server.mock(|when, then| {
                when.method(mock_method).path("/resource");
                then.status(204);
            });

            let builder = match method.as_str() {
                "GET" => client.get(&url),
                "POST" => client.post(&url),
                "PUT" => client.put(&url),
                "PATCH" => client.patch(&url),
                "DELETE" => client.delete(&url),
                "HEAD" => client.head(&url),
                _ => client.options(&url),
            };
            assert_eq!(builder.method(), &method);

            let resp = builder.send().await.unwrap();
            assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);
            assert_eq!(mock.calls(), 1, "{method} should hit the server once");
            mock.delete();
        }
    }

    #[tokio::test]
    async fn post_json_sets_content_type() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/login")
                .header("content-type", "application/json")
                .json_body(json!({"username": "u", "password": "p"}));
            then.status(200);
        });

        let client = test_client();
        let url = format!("{}/login", server.base_url());
        let resp = client
            .post(&url)
            .json(&json!({"username": "u", "password": "p"}))
            .unwrap()
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
        mock.assert();
    }

    #[tokio::test]
    async fn post_form() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/submit")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("key1=value1&key2=value2");
            then.status(200);
        });

        let client = test_client();
        let url = format!("{}/submit", server.base_url());
        client
            .post(&url)
            .form(&[("key1", "value1"), ("key2", "value2")])
            .unwrap()
            .send()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn explicit_content_type_not_overridden() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/doc")
                .header("content-type", "application/merge-patch+json");
            then.status(200);
        });

        let client = test_client();
        let url = format!("{}/doc", server.base_url());
        client
            .put(&url)
            .header("content-type", "application/merge-patch+json")
            .json(&json!({"a": 1}))
            .unwrap()
            .send()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn header_value_replaces_existing() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/h").header("x-token", "second");
            then.status(200);
        });

        let client = test_client();
        let url = format!("{}/h", server.base_url());
        client
            .get(&url)
            .header("x-token", "first")
            .header_value(
                http::HeaderName::from_static("x-token"),
                http::HeaderValue::from_static("second"),
            )
            .send()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn body_string_and_headers_vec() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/raw")
                .header("x-a", "1")
                .header("x-b", "2")
                .body("plain payload");
            then.status(200);
        });

        let client = test_client();
        let url = format!("{}/raw", server.base_url());
        client
            .patch(&url)
            .headers(vec![
                ("x-a".to_owned(), "1".to_owned()),
                ("x-b".to_owned(), "2".to_owned()),
            ])
            .body_string("plain payload".to_owned())
            .send()
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn configured_user_agent_is_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/ua").header("user-agent", "custom/1.0");
            then.status(200);
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .user_agent("custom/1.0")
            .build()
            .unwrap();

        let url = format!("{}/ua", server.base_url());
        client.get(&url).send().await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn error_statuses_are_ok_from_send() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not here");
        });

        let client = test_client();
        let url = format!("{}/missing", server.base_url());
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);

        let resp = client.get(&url).send().await.unwrap();
        let err = resp.text().await.unwrap_err();
        assert!(matches!(
            err,
            HttpError::HttpStatus { status, ref body_preview, .. }
                if status == http::StatusCode::NOT_FOUND && body_preview == "not here"
        ));
    }

    #[tokio::test]
    async fn json_response_parsing() {
        #[derive(serde::Deserialize)]
        struct Payload {
            token: String,
        }

        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(200).json_body(json!({"token": "abc"}));
        });

        let client = test_client();
        let url = format!("{}/json", server.base_url());
        let payload: Payload = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(payload.token, "abc");
    }

    #[tokio::test]
    async fn oversized_response_is_rejected() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/large");
            then.status(200).body("x".repeat(2048));
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .max_body_size(1024)
            .build()
            .unwrap();

        let url = format!("{}/large", server.base_url());
        let err = client.get(&url).send().await.unwrap().bytes().await.unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { limit: 1024, .. }));
    }

    #[tokio::test]
    async fn http_rejected_when_tls_only() {
        let client = HttpClientBuilder::new().build().unwrap();
        let err = client
            .get("http://localhost:1/anything")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { ref scheme, .. } if scheme == "http"));
    }

    #[tokio::test]
    async fn relative_url_rejected() {
        let client = test_client();
        let err = client.get("/relative").send().await.unwrap_err();
        assert!(matches!(
            err,
            HttpError::InvalidUri {
                kind: InvalidUriKind::MissingScheme,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn invalid_header_deferred_to_send() {
        let client = test_client();
        let err = client
            .get("http://localhost:1/")
            .header("bad header", "v")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeaderName(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let client = test_client();
        // port 1 is reserved and not listening
        let err = client.get("http://127.0.0.1:1/").send().await.unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)), "got {err:?}");
    }

    #[test]
    fn accessors() {
        let client = HttpClientBuilder::new()
            .timeout(Duration::from_secs(7))
            .max_body_size(512)
            .build()
            .unwrap();

        assert_eq!(client.request_timeout(), Duration::from_secs(7));
        assert_eq!(client.max_body_size(), 512);
        assert_eq!(client.transport_security(), TransportSecurity::TlsOnly);
        assert_eq!(client.user_agent(), crate::DEFAULT_USER_AGENT);
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<HttpClient>();
    }
}
