//! Reference resolution against the origin store layout.
//!
//! A reference in a stored manifest is either relative to the manifest's own
//! directory, rooted at the tenant root (`orgs/...`), or already an absolute
//! URL. Relative and rooted references are normalized into a storage path and
//! composed onto the CDN base host; absolute URLs are never touched.

use super::{TENANT_ROOT_MARKER, strip_query_and_fragment};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::borrow::Cow;

/// Bytes escaped when a decoded storage path goes back into a URL. `/` stays
/// literal so the path keeps its segments.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// How to treat a `..` segment with nothing left to pop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraversalPolicy {
    /// Drop the excess `..` and keep resolving.
    #[default]
    Clamp,
    /// Refuse to resolve the reference; the line is left unchanged.
    Reject,
}

/// Resolve a reference line into a public URL under `base_host`.
///
/// Returns `None` when the line must be left as-is: blank lines, absolute
/// `http(s)://` URLs, and references that normalize to an empty path.
/// Uses [`TraversalPolicy::Clamp`].
pub fn resolve_reference(line: &str, containing_key: &str, base_host: &str) -> Option<String> {
    normalize_reference(line, containing_key, TraversalPolicy::Clamp)
        .map(|path| compose(base_host, &path))
}

/// Join a normalized storage path onto the CDN base host.
///
/// Trailing slashes on `base_host` are trimmed so the separator is never
/// doubled. The path is decoded text, so characters that would end or break
/// the URL path (`?`, `#`, `%`, spaces) are percent-encoded again. No
/// validation or reachability check is performed.
pub fn compose(base_host: &str, normalized_path: &str) -> String {
    format!(
        "{}/{}",
        base_host.trim_end_matches('/'),
        utf8_percent_encode(normalized_path, PATH_ESCAPE)
    )
}

/// Normalize a reference line into a storage path relative to the store root.
///
/// The result never starts with `/` and contains no `.`, `..` or empty
/// segments. `containing_key` is the storage key of the manifest the line was
/// read from; its directory is the base for non-rooted references.
pub fn normalize_reference(
    line: &str,
    containing_key: &str,
    policy: TraversalPolicy,
) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_absolute_url(trimmed) {
        return None;
    }

    let path = strip_query_and_fragment(trimmed);

    // Decode once only: iterating would let `%252e%252e` turn into `..`
    let decoded: Cow<'_, str> = if path.contains('%') {
        percent_decode_str(path).decode_utf8_lossy()
    } else {
        Cow::Borrowed(path)
    };

    let relative = strip_leading_relative(&decoded);
    let base = if relative.starts_with(TENANT_ROOT_MARKER) {
        ""
    } else {
        parent_dir(containing_key)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() && policy == TraversalPolicy::Reject {
                    return None;
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }

    Some(segments.join("/"))
}

fn is_absolute_url(reference: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        reference
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}

/// Strip every leading `./` and `/`.
fn strip_leading_relative(mut path: &str) -> &str {
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            return path;
        }
    }
}

/// Directory part of a storage key; empty when the key has no `/`.
fn parent_dir(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::{LineKind, classify};

    const KEY: &str = "orgs/o1/uploads/a1/streaming/index.m3u8";
    const HOST: &str = "https://cdn.example.com";

    fn normalize(line: &str) -> Option<String> {
        normalize_reference(line, KEY, TraversalPolicy::Clamp)
    }

    #[test]
    fn relative_reference_resolves_against_manifest_directory() {
        assert_eq!(
            resolve_reference("seg_000.ts", KEY, HOST).as_deref(),
            Some("https://cdn.example.com/orgs/o1/uploads/a1/streaming/seg_000.ts")
        );
    }

    #[test]
    fn tenant_rooted_reference_ignores_manifest_directory() {
        let key = "orgs/o1/uploads/a1/streaming/hi/index.m3u8";
        assert_eq!(
            resolve_reference("orgs/o1/uploads/a1/streaming/hi/seg_000.ts", key, HOST).as_deref(),
            Some("https://cdn.example.com/orgs/o1/uploads/a1/streaming/hi/seg_000.ts")
        );
        assert_eq!(
            normalize("/orgs/o2/shared/seg.ts").as_deref(),
            Some("orgs/o2/shared/seg.ts")
        );
    }

    #[test]
    fn query_and_fragment_are_stripped() {
        assert_eq!(normalize("seg_000.ts?token=abc#frag"), normalize("seg_000.ts"));
        assert_eq!(normalize("seg_000.ts#t=5"), normalize("seg_000.ts"));
    }

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(resolve_reference("https://cdn.example.com/x.ts", KEY, HOST), None);
        assert_eq!(resolve_reference("http://other.example.com/x.ts", KEY, HOST), None);
        assert_eq!(resolve_reference("HTTPS://CDN.EXAMPLE.COM/X.TS", KEY, HOST), None);
    }

    #[test]
    fn blank_lines_do_not_resolve() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
    }

    #[test]
    fn leading_dot_slash_and_slashes_are_stripped() {
        let expected = Some("orgs/o1/uploads/a1/streaming/seg.ts".to_string());
        assert_eq!(normalize("./seg.ts"), expected);
        assert_eq!(normalize("././seg.ts"), expected);
        assert_eq!(normalize("/seg.ts"), expected);
        assert_eq!(normalize(".//./seg.ts"), expected);
    }

    #[test]
    fn dot_segments_are_collapsed() {
        assert_eq!(
            normalize("hi/./../lo/seg.ts").as_deref(),
            Some("orgs/o1/uploads/a1/streaming/lo/seg.ts")
        );
        assert_eq!(
            normalize("../thumbs/seg.ts").as_deref(),
            Some("orgs/o1/uploads/a1/thumbs/seg.ts")
        );
        assert_eq!(
            normalize("hi//seg.ts").as_deref(),
            Some("orgs/o1/uploads/a1/streaming/hi/seg.ts")
        );
    }

    #[test]
    fn percent_encoding_decoded_exactly_once() {
        assert_eq!(
            normalize("seg%20000.ts").as_deref(),
            Some("orgs/o1/uploads/a1/streaming/seg 000.ts")
        );
        // Double-encoded dots stay literal after one decode
        assert_eq!(
            normalize("%252e%252e/seg.ts").as_deref(),
            Some("orgs/o1/uploads/a1/streaming/%2e%2e/seg.ts")
        );
        // Single-encoded dots are real traversal
        assert_eq!(
            normalize("%2e%2e/seg.ts").as_deref(),
            Some("orgs/o1/uploads/a1/seg.ts")
        );
    }

    #[test]
    fn decoded_reserved_characters_are_reencoded_in_url() {
        assert_eq!(
            resolve_reference("seg%3F1.ts", KEY, HOST).as_deref(),
            Some("https://cdn.example.com/orgs/o1/uploads/a1/streaming/seg%3F1.ts")
        );
        assert_eq!(
            resolve_reference("seg%23x.ts", KEY, HOST).as_deref(),
            Some("https://cdn.example.com/orgs/o1/uploads/a1/streaming/seg%23x.ts")
        );
        assert_eq!(
            resolve_reference("my%20seg.ts", KEY, HOST).as_deref(),
            Some("https://cdn.example.com/orgs/o1/uploads/a1/streaming/my%20seg.ts")
        );
        // A literal `%` left by the single decode is escaped, not reinterpreted
        assert_eq!(
            resolve_reference("%252e%252e/seg.ts", KEY, HOST).as_deref(),
            Some("https://cdn.example.com/orgs/o1/uploads/a1/streaming/%252e%252e/seg.ts")
        );
    }

    #[test]
    fn reencoded_urls_still_classify_as_segments() {
        for line in ["seg%3F1.ts", "seg%23x.ts", "my%20seg.ts"] {
            let url = resolve_reference(line, KEY, HOST).unwrap();
            assert_eq!(classify(&url), LineKind::SegmentReference);
        }
    }

    #[test]
    fn compose_leaves_plain_paths_alone() {
        assert_eq!(
            compose(HOST, "orgs/o1/uploads/a1/streaming/seg_000-x.ts"),
            "https://cdn.example.com/orgs/o1/uploads/a1/streaming/seg_000-x.ts"
        );
    }

    #[test]
    fn traversal_above_root_is_clamped() {
        assert_eq!(
            normalize("../../../../../../../etc/seg.ts").as_deref(),
            Some("etc/seg.ts")
        );
    }

    #[test]
    fn traversal_above_root_is_rejected_when_hardened() {
        assert_eq!(
            normalize_reference("../../../../../../etc/seg.ts", KEY, TraversalPolicy::Reject),
            None
        );
        // Traversal that stays inside the root is still fine
        assert_eq!(
            normalize_reference("../seg.ts", KEY, TraversalPolicy::Reject).as_deref(),
            Some("orgs/o1/uploads/a1/seg.ts")
        );
    }

    #[test]
    fn key_without_directory_uses_empty_base() {
        assert_eq!(
            normalize_reference("seg.ts", "index.m3u8", TraversalPolicy::Clamp).as_deref(),
            Some("seg.ts")
        );
        assert_eq!(
            normalize_reference("seg.ts", "", TraversalPolicy::Clamp).as_deref(),
            Some("seg.ts")
        );
    }

    #[test]
    fn reference_collapsing_to_nothing_does_not_resolve() {
        assert_eq!(normalize_reference("..", "index.m3u8", TraversalPolicy::Clamp), None);
        assert_eq!(normalize_reference("./", "", TraversalPolicy::Clamp), None);
    }

    #[test]
    fn normalized_paths_never_start_with_slash() {
        let path = normalize_reference("seg.ts", "/orgs/o1/index.m3u8", TraversalPolicy::Clamp)
            .unwrap();
        assert_eq!(path, "orgs/o1/seg.ts");
    }

    #[test]
    fn compose_never_doubles_separator() {
        assert_eq!(compose("https://cdn.example.com", "a/b.ts"), "https://cdn.example.com/a/b.ts");
        assert_eq!(compose("https://cdn.example.com/", "a/b.ts"), "https://cdn.example.com/a/b.ts");
    }

    #[test]
    fn resolution_is_deterministic() {
        let first = resolve_reference("../hi/seg.ts?x=1", KEY, HOST);
        let second = resolve_reference("../hi/seg.ts?x=1", KEY, HOST);
        assert_eq!(first, second);
    }
}
