//! Transport implementations.
//!
//! - `HttpTransport` - reqwest client with redirects and timeout
//! - `HostCapped` - wrapper that caps concurrent requests per host
//! - `GuardedTransport` - wrapper that refuses internal hosts, also on redirects

pub mod guarded;
pub mod host_capped;
pub mod http;

pub use guarded::{GuardedTransport, HostGuard, RedirectRefused};
pub use host_capped::HostCapped;
pub use http::HttpTransport;
