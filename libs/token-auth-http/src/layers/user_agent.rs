use crate::error::HttpError;
use http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Sets `User-Agent` on requests that arrive without one.
#[derive(Clone, Debug)]
pub struct UserAgentLayer {
    user_agent: HeaderValue,
}

impl UserAgentLayer {
    /// # Errors
    ///
    /// `HttpError::InvalidHeaderValue` if `user_agent` cannot be a header value.
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        let user_agent = HeaderValue::from_str(user_agent.as_ref())?;
        Ok(Self { user_agent })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: HeaderValue,
}

impl<S, ReqBody> Service<Request<ReqBody>> for UserAgentService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.headers_mut()
            .entry(http::header::USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Response;
    use http_body_util::Full;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct EchoUserAgent;

    impl Service<Request<Full<Bytes>>> for EchoUserAgent {
        type Response = Response<String>;
        type Error = HttpError;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let seen = req.headers()[http::header::USER_AGENT]
                .to_str()
                .unwrap()
                .to_owned();
            std::future::ready(Ok(Response::new(seen)))
        }
    }

    fn request(user_agent: Option<&str>) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(Bytes::new()));
        if let Some(value) = user_agent {
            req.headers_mut()
                .insert(http::header::USER_AGENT, HeaderValue::from_str(value).unwrap());
        }
        req
    }

    #[tokio::test]
    async fn fills_in_missing_user_agent_only() {
        let layer = UserAgentLayer::try_new("session/1.0").unwrap();

        let resp = layer.layer(EchoUserAgent).oneshot(request(None)).await.unwrap();
        assert_eq!(resp.body(), "session/1.0");

        let resp = layer
            .layer(EchoUserAgent)
            .oneshot(request(Some("caller/2.0")))
            .await
            .unwrap();
        assert_eq!(resp.body(), "caller/2.0");
    }

    #[test]
    fn rejects_unusable_user_agent() {
        assert!(UserAgentLayer::try_new("bad\x00agent").is_err());
    }
}
