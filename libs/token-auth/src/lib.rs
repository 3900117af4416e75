#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Token-authenticated HTTP sessions
//!
//! An [`AuthSession`] wraps a [`token_auth_http::HttpClient`]. Before each
//! request it asks its [`TokenProvider`] for a token, authenticating against
//! the configured URL when none is cached or the cached one is within
//! [`VALIDITY_MARGIN`] of expiry, and sends the token as
//! `Authentication: Token <value>`.
//!
//! - No network I/O at construction; the first request authenticates.
//! - `401` from the authentication service is [`AuthError::Unauthorized`];
//!   any other status but `200` is [`AuthError::AuthenticationFailed`].
//! - [`AuthSession::logout`] is final: later requests fail with
//!   [`AuthError::SessionClosed`].
//! - The authentication wire format is pluggable through
//!   [`AuthPayloadBuilder`] and [`AuthResponseParser`].
//!
//! Passwords and tokens are kept in process memory. They are redacted from
//! `Debug` output and zeroed on drop, but this crate is not meant for
//! high-security applications.
//!
//! # Example
//!
//! ```ignore
//! use token_auth::{AuthGrant, auth_session, response_parser_fn};
//!
//! let session = auth_session("user", "pass", "https://auth.example.com/login")?;
//! session.set_response_parser(response_parser_fn(|body| {
//!     Ok(AuthGrant { token: body.trim().to_owned(), expires_in: time::Duration::hours(1) })
//! }));
//!
//! let resp = session.get("https://api.example.com/items").send().await?;
//! session.logout().await;
//! ```

mod clock;
mod config;
mod error;
mod hooks;
mod provider;
mod secret;
mod session;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthSessionConfig;
pub use error::AuthError;
pub use hooks::{
    AuthGrant, AuthPayloadBuilder, AuthResponseParser, DefaultPayloadBuilder,
    DefaultResponseParser, FnPayloadBuilder, FnResponseParser, HookError, payload_builder_fn,
    response_parser_fn,
};
pub use provider::TokenProvider;
pub use secret::SecretString;
pub use session::{AuthSession, AuthSessionBuilder, AuthenticatedRequest, Verb, auth_session};
pub use token::{AUTHENTICATION_HEADER, CachedToken, TOKEN_SCHEME, VALIDITY_MARGIN};
