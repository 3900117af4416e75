use crate::error::HttpError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// How much of an error body is kept in [`HttpError::HttpStatus`].
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Response returned by [`RequestBuilder::send`](crate::RequestBuilder::send).
///
/// [`bytes`](Self::bytes) hands back any body regardless of status, which is
/// what callers that interpret statuses themselves want. [`text`](Self::text)
/// and [`json`](Self::json) fail with [`HttpError::HttpStatus`] outside 2xx.
/// Every reader stops at the client's `max_body_size`.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Turn a non-2xx status into an error, leaving the body unread.
    ///
    /// # Errors
    ///
    /// `HttpError::HttpStatus` with an empty preview.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.inner.status().is_success() {
            Ok(self)
        } else {
            Err(self.status_error(String::new()))
        }
    }

    /// Whole body, any status.
    ///
    /// # Errors
    ///
    /// `HttpError::BodyTooLarge` past the limit, `HttpError::Transport` if
    /// the stream breaks.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let limit = self.max_body_size;
        collect_limited(self.inner.into_body(), limit).await
    }

    /// Body as lossy UTF-8, 2xx only.
    ///
    /// # Errors
    ///
    /// As [`bytes`](Self::bytes), plus `HttpError::HttpStatus` for other statuses.
    pub async fn text(self) -> Result<String, HttpError> {
        let body = self.success_body().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Body parsed as JSON, 2xx only.
    ///
    /// # Errors
    ///
    /// As [`text`](Self::text), plus `HttpError::Json`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = self.success_body().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn success_body(self) -> Result<Bytes, HttpError> {
        if self.inner.status().is_success() {
            return self.bytes().await;
        }

        let limit = self.max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
        let (parts, body) = self.inner.into_parts();
        let preview = match collect_limited(body, limit).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
            Err(e) => return Err(e),
        };
        Err(HttpError::HttpStatus {
            status: parts.status,
            body_preview: preview,
            content_type: content_type(&parts.headers),
        })
    }

    fn status_error(&self, body_preview: String) -> HttpError {
        HttpError::HttpStatus {
            status: self.inner.status(),
            body_preview,
            content_type: content_type(self.inner.headers()),
        }
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(http::header::CONTENT_TYPE)?;
    value.to_str().ok().map(str::to_owned)
}

async fn collect_limited(body: ResponseBody, limit: usize) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(body);
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        let Ok(chunk) = frame.into_data() else {
            continue;
        };
        let actual = buf.len() + chunk.len();
        if actual > limit {
            return Err(HttpError::BodyTooLarge { limit, actual });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}
