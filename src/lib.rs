//! playgate: HLS playback gateway.
//!
//! Serves stored HLS manifests with every segment and variant reference
//! rewritten to a public CDN URL. The rewriting engine lives in [`hls`]; the
//! rest is the HTTP surface and its collaborators.

pub mod assets;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod hls;
pub mod http_retry;
pub mod metrics;
pub mod origin;
pub mod server;
