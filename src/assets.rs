//! Asset lookup: which organization owns an asset and where its streaming
//! manifest lives in the origin store.

use crate::error::{PlaygateError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A playable asset as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub org_id: String,
    /// Explicit manifest key; defaults to the transcoder's output layout.
    #[serde(default)]
    pub streaming_key: Option<String>,
    /// False until the transcoder has uploaded the HLS output.
    #[serde(default = "default_ready")]
    pub streaming_ready: bool,
}

fn default_ready() -> bool {
    true
}

impl AssetRecord {
    pub fn new(id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org_id: org_id.into(),
            streaming_key: None,
            streaming_ready: true,
        }
    }

    /// Storage key of the asset's top-level manifest.
    pub fn storage_key(&self) -> String {
        match &self.streaming_key {
            Some(key) => key.trim_start_matches('/').to_string(),
            None => format!(
                "orgs/{}/uploads/{}/streaming/index.m3u8",
                self.org_id, self.id
            ),
        }
    }
}

#[async_trait]
pub trait AssetLookup: Send + Sync {
    async fn lookup(&self, asset_id: &str) -> Result<Option<AssetRecord>>;
}

/// In-memory asset catalog.
#[derive(Clone, Debug, Default)]
pub struct AssetCatalog {
    assets: Arc<DashMap<String, AssetRecord>>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON array of [`AssetRecord`]s.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PlaygateError::Internal(format!("reading asset catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&raw)?;
        info!("Loaded {} assets from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let records: Vec<AssetRecord> = serde_json::from_str(raw)
            .map_err(|e| PlaygateError::Internal(format!("parsing asset catalog: {e}")))?;

        let catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        Ok(catalog)
    }

    pub fn insert(&self, record: AssetRecord) {
        self.assets.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[async_trait]
impl AssetLookup for AssetCatalog {
    async fn lookup(&self, asset_id: &str) -> Result<Option<AssetRecord>> {
        Ok(self.assets.get(asset_id).map(|entry| entry.value().clone()))
    }
}
