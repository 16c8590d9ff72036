use super::classify::{LineKind, classify};
use super::resolve::{TraversalPolicy, compose, normalize_reference};
use tracing::debug;

/// Whether a manifest lists segments, variants, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// Media playlist: segment references are rewritten.
    Media,
    /// Master playlist: variant references are rewritten.
    Master,
    /// No references found; the manifest is returned untouched.
    Unrecognized,
}

impl ManifestKind {
    /// Decide the kind from reference counts. Segments win over variants.
    pub fn from_counts(segments: usize, variants: usize) -> Self {
        if segments > 0 {
            ManifestKind::Media
        } else if variants > 0 {
            ManifestKind::Master
        } else {
            ManifestKind::Unrecognized
        }
    }

    /// Line kind that gets rewritten for this manifest kind.
    fn target(self) -> Option<LineKind> {
        match self {
            ManifestKind::Media => Some(LineKind::SegmentReference),
            ManifestKind::Master => Some(LineKind::VariantReference),
            ManifestKind::Unrecognized => None,
        }
    }

    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestKind::Media => "media",
            ManifestKind::Master => "master",
            ManifestKind::Unrecognized => "unrecognized",
        }
    }
}

/// Summary of a single rewrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteReport {
    pub kind: ManifestKind,
    pub segments: usize,
    pub variants: usize,
    /// Reference lines actually replaced with a CDN URL.
    pub rewritten: usize,
}

/// Rewrites stored manifests so every internal reference points at the CDN.
///
/// Cheap to clone and safe to share across tasks; it only carries the base
/// host and the traversal policy.
#[derive(Debug, Clone)]
pub struct ManifestRewriter {
    base_host: String,
    policy: TraversalPolicy,
}

impl ManifestRewriter {
    pub fn new(base_host: impl Into<String>) -> Self {
        Self {
            base_host: base_host.into(),
            policy: TraversalPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TraversalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    pub fn policy(&self) -> TraversalPolicy {
        self.policy
    }

    /// Resolve one reference line, or `None` to leave it unchanged.
    pub fn resolve(&self, line: &str, containing_key: &str) -> Option<String> {
        normalize_reference(line, containing_key, self.policy)
            .map(|path| compose(&self.base_host, &path))
    }

    /// Public URL for an object at `storage_key`.
    pub fn public_url(&self, storage_key: &str) -> String {
        compose(&self.base_host, storage_key.trim_start_matches('/'))
    }

    /// Rewrite `text`, the manifest stored at `containing_key`.
    pub fn rewrite(&self, text: &str, containing_key: &str) -> String {
        self.inspect(text, containing_key).0
    }

    /// Rewrite and report what was found and changed.
    ///
    /// Lines are split on `\n` with a trailing `\r` removed, and rejoined with
    /// `\n`. Lines that are not of the selected reference kind, or that fail
    /// to resolve, are copied through verbatim.
    pub fn inspect(&self, text: &str, containing_key: &str) -> (String, RewriteReport) {
        let lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        let kinds: Vec<LineKind> = lines.iter().map(|line| classify(line)).collect();

        let segments = count(&kinds, LineKind::SegmentReference);
        let variants = count(&kinds, LineKind::VariantReference);
        let kind = ManifestKind::from_counts(segments, variants);

        let mut report = RewriteReport {
            kind,
            segments,
            variants,
            rewritten: 0,
        };

        let Some(target) = kind.target() else {
            debug!("No segment or variant references in {}", containing_key);
            return (text.to_string(), report);
        };

        let mut output = String::with_capacity(text.len() + lines.len() * self.base_host.len());
        for (idx, (line, line_kind)) in lines.iter().zip(&kinds).enumerate() {
            if idx > 0 {
                output.push('\n');
            }

            let resolved = if *line_kind == target {
                self.resolve(line, containing_key)
            } else {
                None
            };

            match resolved {
                Some(url) => {
                    debug!("Rewrote {} -> {}", line.trim(), url);
                    report.rewritten += 1;
                    output.push_str(&url);
                }
                None => output.push_str(line),
            }
        }

        (output, report)
    }
}

fn count(kinds: &[LineKind], wanted: LineKind) -> usize {
    kinds.iter().filter(|kind| **kind == wanted).count()
}

/// Rewrite a manifest with the default traversal policy.
pub fn rewrite_manifest(text: &str, containing_key: &str, base_host: &str) -> String {
    ManifestRewriter::new(base_host).rewrite(text, containing_key)
}
