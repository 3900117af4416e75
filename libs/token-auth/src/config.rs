use std::time::Duration;

use serde::{Deserialize, Deserializer};
use token_auth_http::{HttpClientConfig, TransportSecurity};
use url::Url;

/// Deserializable settings of an [`AuthSession`](crate::AuthSession).
///
/// Credentials are deliberately absent; pass them to
/// [`AuthSession::from_config`](crate::AuthSession::from_config).
///
/// ```yaml
/// auth_url: https://auth.example.com/login
/// request_timeout: 15s
/// user_agent: inventory-sync/2.1
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSessionConfig {
    /// Authentication endpoint receiving the credentials POST.
    pub auth_url: Url,

    /// Per-request timeout, humantime format (default: `30s`).
    #[serde(default = "default_request_timeout", deserialize_with = "humantime_duration")]
    pub request_timeout: Duration,

    /// User-Agent override.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Accept `http://` URLs. For local testing only.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl AuthSessionConfig {
    #[must_use]
    pub fn new(auth_url: Url) -> Self {
        Self {
            auth_url,
            request_timeout: default_request_timeout(),
            user_agent: None,
            allow_insecure_http: false,
        }
    }

    /// Transport settings derived from this config, on top of
    /// [`HttpClientConfig::auth_endpoint`].
    #[must_use]
    pub fn http_config(&self) -> HttpClientConfig {
        let mut config = HttpClientConfig::auth_endpoint();
        config.request_timeout = self.request_timeout;
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if self.allow_insecure_http {
            tracing::warn!(
                url = %self.auth_url,
                "allow_insecure_http is set - credentials and tokens travel unencrypted"
            );
            config.transport = TransportSecurity::AllowInsecureHttp;
        }
        config
    }
}
