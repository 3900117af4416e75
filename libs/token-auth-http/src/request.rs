use crate::client::ClientService;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::Request;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http_body_util::Full;
use serde::Serialize;
use tower::ServiceExt;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Outbound request under construction
///
/// Created by the verb methods on [`HttpClient`](crate::HttpClient). An
/// invalid header is remembered and reported by [`send()`](RequestBuilder::send).
///
/// ```ignore
/// let resp = client
///     .put("https://api.example.com/items/7")
///     .header("if-match", etag)
///     .json(&item)?
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: ClientService,
    max_body_size: usize,
    transport_security: TransportSecurity,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    /// Content type implied by `json`/`form`, used when no explicit header is set
    implied_content_type: Option<&'static str>,
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: ClientService,
        max_body_size: usize,
        transport_security: TransportSecurity,
        method: http::Method,
        url: String,
    ) -> Self {
        Self {
            service,
            max_body_size,
            transport_security,
            method,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            implied_content_type: None,
            error: None,
        }
    }

    /// The request method
    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// The request URL as given by the caller
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Add a header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Add several headers
    pub fn headers(self, headers: Vec<(String, String)>) -> Self {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(&name, &value))
    }

    /// Set a typed header, replacing any value previously set under that name
    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value));
        self
    }

    /// Set the body as JSON (`Content-Type: application/json` unless set)
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.set_body(Bytes::from(serde_json::to_vec(body)?), Some(JSON));
        Ok(self)
    }

    /// Set the body as form URL-encoded fields
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or `HttpError::FormEncode` if encoding fails.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.set_body(Bytes::from(serde_urlencoded::to_string(fields)?), Some(FORM));
        Ok(self)
    }

    /// Set the body as raw bytes
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.set_body(body, None);
        self
    }

    /// Set the body as a string
    pub fn body_string(mut self, body: String) -> Self {
        self.set_body(Bytes::from(body), None);
        self
    }

    fn set_body(&mut self, body: Bytes, content_type: Option<&'static str>) {
        self.body = body;
        self.implied_content_type = content_type;
    }

    /// Parse the URL and check its scheme against the transport security mode.
    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind: InvalidUriKind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;

        let Some(scheme) = uri.scheme_str() else {
            return Err(invalid(InvalidUriKind::MissingScheme, "URL has no scheme".to_owned()));
        };
        if uri.authority().is_none() {
            return Err(invalid(InvalidUriKind::MissingAuthority, "URL has no host".to_owned()));
        }

        let allowed = match scheme {
            "https" => true,
            "http" => self.transport_security == TransportSecurity::AllowInsecureHttp,
            _ => false,
        };
        if allowed {
            return Ok(uri);
        }

        let reason = if scheme == "http" {
            "plain HTTP is disabled; enable AllowInsecureHttp for local testing"
        } else {
            "expected http or https"
        };
        Err(HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: reason.to_owned(),
        })
    }

    /// Send the request
    ///
    /// Every HTTP status is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` for deferred builder errors, URL/scheme validation
    /// failures, timeouts and transport failures.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.validate_url()?;
        let mut builder = Request::builder().method(self.method).uri(uri);

        if let Some(content_type) = self.implied_content_type
            && !self.headers.iter().any(|(name, _)| name == CONTENT_TYPE)
        {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(Full::new(self.body))?;

        let inner = self.service.oneshot(request).await?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // header values may carry credentials
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .finish_non_exhaustive()
    }
}
