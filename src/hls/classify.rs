use super::{SEGMENT_EXTENSION, VARIANT_EXTENSION, strip_query_and_fragment};

/// What a single manifest line refers to.
///
/// HLS does not tag URI lines, so the kind is inferred from content: comment
/// and tag lines start with `#`, and references are recognized by the
/// extension of their path component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Tag, comment, blank line, or any content line that is not recognized
    /// as a reference. Always passed through untouched.
    Directive,
    /// Names a media segment chunk.
    SegmentReference,
    /// Names a nested variant playlist.
    VariantReference,
}

/// Classify one manifest line.
///
/// Extension matching is case-insensitive and ignores query strings and
/// fragments (`seg_001.TS?token=x` is a segment reference).
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return LineKind::Directive;
    }

    let path = strip_query_and_fragment(trimmed).to_ascii_lowercase();
    if path.ends_with(SEGMENT_EXTENSION) {
        LineKind::SegmentReference
    } else if path.ends_with(VARIANT_EXTENSION) {
        LineKind::VariantReference
    } else {
        LineKind::Directive
    }
}
