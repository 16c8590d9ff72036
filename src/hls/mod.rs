//! HLS manifest rewriting engine.
//!
//! Turns a stored playlist into one a player can fetch straight from the CDN:
//! [`classify`] sniffs each line, [`resolve`] maps references onto normalized
//! storage paths and composes public URLs, and [`rewrite`] drives both over a
//! whole manifest. Nothing here performs I/O or holds state between calls.

pub mod classify;
pub mod resolve;
pub mod rewrite;

pub use classify::{LineKind, classify};
pub use resolve::{TraversalPolicy, compose, normalize_reference, resolve_reference};
pub use rewrite::{ManifestKind, ManifestRewriter, RewriteReport, rewrite_manifest};

/// MIME type served for rewritten playlists.
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Extension of media segment chunks written by the transcoder.
pub const SEGMENT_EXTENSION: &str = ".ts";

/// Extension of nested (variant) playlists.
pub const VARIANT_EXTENSION: &str = ".m3u8";

/// Leading path segment under which every tenant's objects live.
pub const TENANT_ROOT_MARKER: &str = "orgs/";

/// Return `reference` with any query string or fragment removed.
pub(crate) fn strip_query_and_fragment(reference: &str) -> &str {
    match reference.find(['?', '#']) {
        Some(idx) => &reference[..idx],
        None => reference,
    }
}
