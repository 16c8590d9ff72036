use crate::{
    auth::{Decision, bearer_token},
    error::{PlaygateError, Result},
    hls::HLS_CONTENT_TYPE,
    metrics,
    origin::OriginError,
    server::state::AppState,
};
use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Span, debug, error, field, info, instrument, warn};

/// What the playback endpoint returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// The rewritten manifest.
    #[default]
    Manifest,
    /// Only the CDN URL of the stored manifest, as plain text.
    Direct,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybackParams {
    #[serde(default)]
    mode: PlaybackMode,
}

/// Steps of a playback request, recorded on the request span.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Authenticating,
    ResolvingAsset,
    Authorizing,
    FetchingManifest,
    Rewriting,
    Responding,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Authenticating => "authenticating",
            Stage::ResolvingAsset => "resolving_asset",
            Stage::Authorizing => "authorizing",
            Stage::FetchingManifest => "fetching_manifest",
            Stage::Rewriting => "rewriting",
            Stage::Responding => "responding",
        }
    }

    fn enter(self) {
        Span::current().record("stage", self.as_str());
        debug!("Playback stage: {}", self.as_str());
    }
}

/// Serve an asset's manifest with every reference pointing at the CDN
///
/// The caller only names the asset; the storage key and the CDN host come
/// from the asset catalog and configuration.
#[instrument(skip_all, fields(asset_id = %asset_id, stage = field::Empty))]
pub async fn serve_playback(
    Path(asset_id): Path<String>,
    params: std::result::Result<Query<PlaybackParams>, QueryRejection>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();

    let result = match params {
        Ok(Query(params)) => playback(&state, &asset_id, params.mode, &headers).await,
        Err(rejection) => Err(PlaygateError::BadRequest(rejection.body_text())),
    };

    let status = match &result {
        Ok(response) => response.status().as_u16(),
        Err(e) if e.status().is_server_error() => {
            error!(error = %e, "Playback failed");
            e.status().as_u16()
        }
        Err(e) => {
            info!(error = %e, "Playback refused");
            e.status().as_u16()
        }
    };
    metrics::record_request("playback", status);
    metrics::record_duration("playback", start);

    result
}

async fn playback(
    state: &AppState,
    asset_id: &str,
    mode: PlaybackMode,
    headers: &HeaderMap,
) -> Result<Response> {
    Stage::Authenticating.enter();
    let caller = state.authorizer.authenticate(bearer_token(headers))?;

    Stage::ResolvingAsset.enter();
    let asset = state
        .assets
        .lookup(asset_id)
        .await?
        .ok_or_else(|| PlaygateError::AssetNotFound(asset_id.to_string()))?;

    Stage::Authorizing.enter();
    if let Decision::Deny(reason) = state.authorizer.authorize(&caller, &asset).await {
        warn!("Denied playback of {} to user {}: {}", asset_id, caller.user_id, reason);
        // Assets of other organizations are not disclosed
        if caller.org_id != asset.org_id {
            return Err(PlaygateError::AssetNotFound(asset_id.to_string()));
        }
        return Err(PlaygateError::Forbidden(reason));
    }

    if !asset.streaming_ready {
        return Err(PlaygateError::ManifestNotReady(asset_id.to_string()));
    }

    let storage_key = asset.storage_key();

    if mode == PlaybackMode::Direct {
        Stage::Responding.enter();
        let url = state.rewriter.public_url(&storage_key);
        info!("Serving direct URL for {}", asset_id);
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            url,
        )
            .into_response());
    }

    Stage::FetchingManifest.enter();
    let raw = fetch_manifest(state, &storage_key).await?;

    Stage::Rewriting.enter();
    let (body, report) = state.rewriter.inspect(&raw, &storage_key);
    metrics::record_rewrite(report.kind.as_str());
    info!(
        "Rewrote {} manifest {}: {} of {} references",
        report.kind.as_str(),
        storage_key,
        report.rewritten,
        report.segments.max(report.variants)
    );

    Stage::Responding.enter();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HLS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}

/// Raw manifest text for `storage_key`, from cache or origin.
async fn fetch_manifest(state: &AppState, storage_key: &str) -> Result<Arc<str>> {
    if let Some(body) = state.manifest_cache.get(storage_key) {
        return Ok(body);
    }

    let body = state
        .origin
        .fetch_manifest(storage_key)
        .await
        .map_err(|e| match e {
            OriginError::NotFound(key) => {
                metrics::record_origin_error("not_found");
                PlaygateError::ManifestNotReady(key)
            }
            OriginError::Transient(reason) => {
                metrics::record_origin_error("transient");
                PlaygateError::OriginUnavailable(reason)
            }
            OriginError::Failed(reason) => {
                metrics::record_origin_error("failed");
                PlaygateError::OriginFetchError(reason)
            }
        })?;

    state.manifest_cache.insert(storage_key, &body);
    Ok(Arc::from(body))
}
