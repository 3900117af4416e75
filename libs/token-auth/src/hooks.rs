//! Pluggable wire format of the authentication exchange.
//!
//! A [`TokenProvider`](crate::TokenProvider) holds exactly one
//! [`AuthPayloadBuilder`] and one [`AuthResponseParser`]. Installing a new
//! one replaces the previous one; nothing is validated until the next
//! authentication runs.

use std::fmt;

use serde::{Deserialize, Deserializer};
use time::Duration;

/// Error raised by a hook, surfaced as [`AuthError::Hook`](crate::AuthError::Hook).
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Token and lifetime extracted from a successful authentication response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    /// Opaque token value.
    pub token: String,
    /// Lifetime counted from when the response was received. On the wire it
    /// is a JSON number of seconds, integral or not.
    #[serde(deserialize_with = "lifetime_seconds")]
    pub expires_in: Duration,
}

fn lifetime_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "expires_in must be a non-negative number of seconds, got {secs}"
        )));
    }
    Duration::checked_seconds_f64(secs)
        .ok_or_else(|| serde::de::Error::custom(format!("expires_in out of range: {secs}")))
}

impl fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGrant")
            .field("token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Builds the JSON body POSTed to the authentication URL.
pub trait AuthPayloadBuilder: Send + Sync {
    /// # Errors
    ///
    /// Any error is returned to the caller of the request that triggered
    /// authentication.
    fn build_auth_payload(
        &self,
        username: &str,
        password: &str,
    ) -> Result<serde_json::Value, HookError>;
}

/// Extracts an [`AuthGrant`] from the body of a `200` authentication response.
pub trait AuthResponseParser: Send + Sync {
    /// # Errors
    ///
    /// Any error is returned to the caller of the request that triggered
    /// authentication.
    fn parse_auth_response(&self, body: &str) -> Result<AuthGrant, HookError>;
}

/// `{"username": "<u>", "password": "<p>"}`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPayloadBuilder;

impl AuthPayloadBuilder for DefaultPayloadBuilder {
    fn build_auth_payload(
        &self,
        username: &str,
        password: &str,
    ) -> Result<serde_json::Value, HookError> {
        Ok(serde_json::json!({
            "username": username,
            "password": password,
        }))
    }
}

/// Reads `token` and `expires_in` from a JSON object; other keys are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseParser;

impl AuthResponseParser for DefaultResponseParser {
    fn parse_auth_response(&self, body: &str) -> Result<AuthGrant, HookError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Adapter returned by [`payload_builder_fn`].
pub struct FnPayloadBuilder<F>(F);

/// Use a closure as an [`AuthPayloadBuilder`].
///
/// ```ignore
/// session.set_payload_builder(payload_builder_fn(|u, p| {
///     Ok(serde_json::json!({ "auth_data": format!("{u}:{p}") }))
/// }));
/// ```
pub fn payload_builder_fn<F>(f: F) -> FnPayloadBuilder<F>
where
    F: Fn(&str, &str) -> Result<serde_json::Value, HookError> + Send + Sync,
{
    FnPayloadBuilder(f)
}

impl<F> AuthPayloadBuilder for FnPayloadBuilder<F>
where
    F: Fn(&str, &str) -> Result<serde_json::Value, HookError> + Send + Sync,
{
    fn build_auth_payload(
        &self,
        username: &str,
        password: &str,
    ) -> Result<serde_json::Value, HookError> {
        (self.0)(username, password)
    }
}

impl<F> fmt::Debug for FnPayloadBuilder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPayloadBuilder").finish_non_exhaustive()
    }
}

/// Adapter returned by [`response_parser_fn`].
pub struct FnResponseParser<F>(F);

/// Use a closure as an [`AuthResponseParser`].
pub fn response_parser_fn<F>(f: F) -> FnResponseParser<F>
where
    F: Fn(&str) -> Result<AuthGrant, HookError> + Send + Sync,
{
    FnResponseParser(f)
}

impl<F> AuthResponseParser for FnResponseParser<F>
where
    F: Fn(&str) -> Result<AuthGrant, HookError> + Send + Sync,
{
    fn parse_auth_response(&self, body: &str) -> Result<AuthGrant, HookError> {
        (self.0)(body)
    }
}

impl<F> fmt::Debug for FnResponseParser<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnResponseParser").finish_non_exhaustive()
    }
}
