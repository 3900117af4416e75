use http::header::{HeaderName, HeaderValue, InvalidHeaderValue};
use time::{Duration, OffsetDateTime};
use zeroize::Zeroizing;

use crate::secret::SecretString;

/// Safety margin applied to token expiry.
///
/// A token is reused only while at least this much of its lifetime remains,
/// so it cannot lapse between the validity check and the request using it.
pub const VALIDITY_MARGIN: Duration = Duration::seconds(60);

/// Header carrying the token on authenticated requests.
///
/// This is `Authentication`, not `Authorization`; servers of this protocol
/// expect the nonstandard name.
pub const AUTHENTICATION_HEADER: HeaderName = HeaderName::from_static("authentication");

/// Scheme prefix of the [`AUTHENTICATION_HEADER`] value.
pub const TOKEN_SCHEME: &str = "Token";

/// Token obtained from the authentication service.
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: SecretString,
    expires_at: OffsetDateTime,
}

impl CachedToken {
    #[must_use]
    pub fn new(value: SecretString, expires_at: OffsetDateTime) -> Self {
        Self { value, expires_at }
    }

    #[must_use]
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    /// `now + VALIDITY_MARGIN <= expires_at`
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now.checked_add(VALIDITY_MARGIN)
            .is_some_and(|deadline| deadline <= self.expires_at)
    }

    /// `Token <value>`, flagged sensitive so `http` never prints it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let raw = Zeroizing::new(format!("{TOKEN_SCHEME} {}", self.value.expose()));
        let mut value = HeaderValue::from_str(&raw)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn token_expiring_at(expires_at: OffsetDateTime) -> CachedToken {
        CachedToken::new(SecretString::new("TOKEN"), expires_at)
    }

    #[test]
    fn valid_until_margin_reached() {
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let token = token_expiring_at(t0 + Duration::seconds(600));

        assert!(token.is_valid_at(t0));
        assert!(token.is_valid_at(t0 + Duration::seconds(539)));
        assert!(token.is_valid_at(t0 + Duration::seconds(540)));
        assert!(!token.is_valid_at(t0 + Duration::seconds(541)));
        assert!(!token.is_valid_at(t0 + Duration::seconds(600)));
    }

    #[test]
    fn short_lived_token_is_never_valid() {
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let token = token_expiring_at(t0 + Duration::seconds(30));
        assert!(!token.is_valid_at(t0));
    }

    #[test]
    fn header_value_uses_token_scheme() {
        let token = token_expiring_at(OffsetDateTime::UNIX_EPOCH);
        let value = token.header_value().unwrap();
        assert_eq!(value.to_str().unwrap(), "Token TOKEN");
        assert!(value.is_sensitive());
        assert_eq!(AUTHENTICATION_HEADER.as_str(), "authentication");
    }

    #[test]
    fn header_value_rejects_control_characters() {
        let token = CachedToken::new(SecretString::new("bad\ntoken"), OffsetDateTime::UNIX_EPOCH);
        assert!(token.header_value().is_err());
    }

    #[test]
    fn debug_hides_value() {
        let token = CachedToken::new(SecretString::new("s3cr3t"), OffsetDateTime::UNIX_EPOCH);
        assert!(!format!("{token:?}").contains("s3cr3t"));
    }
}
