#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for authenticated sessions
//!
//! A hyper-based client with:
//! - TLS via rustls (HTTPS only unless plain HTTP is explicitly allowed)
//! - Connection pooling
//! - A per-request timeout
//! - User-Agent header injection
//! - Body-size limits on every response reader
//!
//! Every HTTP status comes back from `send()` as `Ok`; interpreting the
//! status is left to the caller.
//!
//! # Example
//!
//! ```ignore
//! use token_auth_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("my-app/1.0")
//!     .build()?;
//!
//! let resp = client.get("https://example.com/api").send().await?;
//! if resp.status() == http::StatusCode::OK {
//!     let body = resp.bytes().await?;
//! }
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
pub mod tls;

pub use builder::HttpClientBuilder;
pub use client::{ClientService, HttpClient};
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{UserAgentLayer, UserAgentService};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
