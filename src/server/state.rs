use crate::{
    assets::{AssetCatalog, AssetLookup},
    auth::{Authorizer, JwtAuthorizer},
    cache::ManifestCache,
    config::Config,
    hls::ManifestRewriter,
    http_retry::RetryConfig,
    metrics,
    origin::{HttpOrigin, OriginStore},
    server::rate_limit::RateLimiter,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-attempt timeout for origin manifest fetches.
const ORIGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Rewrites stored manifests onto the CDN host
    pub rewriter: ManifestRewriter,
    pub origin: Arc<dyn OriginStore>,
    pub assets: Arc<dyn AssetLookup>,
    pub authorizer: Arc<dyn Authorizer>,
    pub manifest_cache: ManifestCache,
    /// `None` when rate limiting is disabled
    pub rate_limiter: Option<RateLimiter>,
    pub metrics: PrometheusHandle,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    /// Build state with the production collaborators: HTTP origin, JWT
    /// authorizer and an asset catalog loaded from `ASSET_CATALOG_PATH`.
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        let origin = HttpOrigin::new(
            http_client,
            config.origin_url.clone(),
            RetryConfig {
                max_attempts: config.origin_retry_attempts,
                backoff: Duration::from_millis(config.origin_retry_backoff_ms),
                timeout: Some(ORIGIN_TIMEOUT),
            },
        );

        let assets = match &config.asset_catalog_path {
            Some(path) => AssetCatalog::from_json_file(path)?,
            None => AssetCatalog::new(),
        };

        let authorizer = JwtAuthorizer::new(&config.jwt_secret, config.jwt_issuer.as_deref());

        Ok(Self::with_collaborators(
            config,
            Arc::new(origin),
            Arc::new(assets),
            Arc::new(authorizer),
        ))
    }

    /// Build state around caller-supplied collaborators.
    pub fn with_collaborators(
        config: Config,
        origin: Arc<dyn OriginStore>,
        assets: Arc<dyn AssetLookup>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let rewriter =
            ManifestRewriter::new(config.cdn_base_url.clone()).with_policy(config.traversal_policy);
        let manifest_cache = ManifestCache::new(config.manifest_cache_ttl());
        let rate_limiter =
            (config.rate_limit_rpm > 0).then(|| RateLimiter::per_minute(config.rate_limit_rpm));

        Self {
            config: Arc::new(config),
            rewriter,
            origin,
            assets,
            authorizer,
            manifest_cache,
            rate_limiter,
            metrics: metrics::init(),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }
}
