use crate::hls::TraversalPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public CDN host that rewritten references point at
    pub cdn_base_url: String,
    /// Origin store base URL that raw manifests are fetched from
    pub origin_url: String,
    pub is_dev: bool,
    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,
    /// Expected `iss` claim, checked only when set
    pub jwt_issuer: Option<String>,
    /// JSON file seeding the asset catalog
    pub asset_catalog_path: Option<PathBuf>,
    /// TTL for cached origin manifests in seconds (0 disables the cache)
    pub manifest_cache_ttl_secs: u64,
    /// Requests per minute per client (0 disables rate limiting)
    pub rate_limit_rpm: u32,
    /// Origin fetch attempts, including the first
    pub origin_retry_attempts: u32,
    /// Backoff between origin fetch attempts in milliseconds
    pub origin_retry_backoff_ms: u64,
    /// Handling of `..` segments that climb above the store root
    pub traversal_policy: TraversalPolicy,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, connection settings are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let cdn_base_url = if is_dev {
            env::var("CDN_BASE_URL").unwrap_or_else(|_| "http://localhost:3000/cdn".to_string())
        } else {
            env::var("CDN_BASE_URL").map_err(|_| "CDN_BASE_URL is required in production")?
        };
        let cdn_base_url = validate_base_url("CDN_BASE_URL", &cdn_base_url)?;

        let origin_url = if is_dev {
            env::var("ORIGIN_URL").unwrap_or_else(|_| "http://localhost:9000/media".to_string())
        } else {
            env::var("ORIGIN_URL").map_err(|_| "ORIGIN_URL is required in production")?
        };
        let origin_url = validate_base_url("ORIGIN_URL", &origin_url)?;

        let jwt_secret = if is_dev {
            env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string())
        } else {
            env::var("JWT_SECRET").map_err(|_| "JWT_SECRET is required in production")?
        };

        let jwt_issuer = env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty());
        let asset_catalog_path = env::var("ASSET_CATALOG_PATH").ok().map(PathBuf::from);

        let manifest_cache_ttl_secs = env::var("MANIFEST_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2);

        let rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .unwrap_or(600);

        let origin_retry_attempts = env::var("ORIGIN_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2);

        let origin_retry_backoff_ms = env::var("ORIGIN_RETRY_BACKOFF_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .unwrap_or(500);

        let traversal_policy = match env::var("PATH_TRAVERSAL")
            .unwrap_or_else(|_| "clamp".to_string())
            .to_lowercase()
            .as_str()
        {
            "reject" => TraversalPolicy::Reject,
            _ => TraversalPolicy::Clamp,
        };

        Ok(Config {
            port,
            cdn_base_url,
            origin_url,
            is_dev,
            jwt_secret,
            jwt_issuer,
            asset_catalog_path,
            manifest_cache_ttl_secs,
            rate_limit_rpm,
            origin_retry_attempts,
            origin_retry_backoff_ms,
            traversal_policy,
        })
    }

    pub fn manifest_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.manifest_cache_ttl_secs)
    }
}

/// Require an absolute http(s) URL with a host; returns it without trailing `/`.
fn validate_base_url(name: &str, value: &str) -> Result<String, Box<dyn std::error::Error>> {
    let parsed = Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("{name} must use http or https, got '{scheme}'").into()),
    }

    if parsed.host_str().is_none() {
        return Err(format!("{name} has no host").into());
    }

    Ok(value.trim_end_matches('/').to_string())
}
