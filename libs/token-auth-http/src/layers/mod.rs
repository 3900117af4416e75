//! Tower layers composed by [`HttpClientBuilder`](crate::HttpClientBuilder).
//!
//! - [`UserAgentLayer`] - stamps a default User-Agent on outbound requests

mod user_agent;

pub use user_agent::{UserAgentLayer, UserAgentService};
