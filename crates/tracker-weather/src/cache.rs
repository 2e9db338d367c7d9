//! Persistent cache of NWS grid tokens, keyed by location id.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracker_core::persist::{load_json, save_json_atomic};
use tracker_core::{Location, PersistenceError, ProviderError, ResolutionError};

use crate::source::GridResolver;
use crate::types::GridToken;

#[derive(Debug)]
pub struct GridCache {
    path: PathBuf,
    entries: BTreeMap<String, GridToken>,
}

impl GridCache {
    /// Load the cache file. A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let entries: BTreeMap<String, GridToken> = load_json(path)?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded grid cache");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached token, or a fresh lookup through `resolver` that is then cached.
    /// Failures are not cached.
    pub async fn resolve(
        &mut self,
        location: &Location,
        resolver: &dyn GridResolver,
    ) -> Result<GridToken, ResolutionError> {
        if let Some(token) = self.entries.get(&location.id) {
            return Ok(token.clone());
        }

        let token = resolver.resolve_grid(location).await.map_err(|e| match e {
            ProviderError::NoData(_) | ProviderError::InvalidResponse(_) => {
                ResolutionError::NoToken {
                    location: location.id.clone(),
                }
            }
            source => ResolutionError::Provider {
                location: location.id.clone(),
                source,
            },
        })?;

        self.entries.insert(location.id.clone(), token.clone());
        Ok(token)
    }

    /// Drop one entry so the next `resolve` asks the provider again.
    pub fn invalidate(&mut self, location_id: &str) -> bool {
        self.entries.remove(location_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn save(&self) -> Result<(), PersistenceError> {
        save_json_atomic(&self.path, &self.entries)
    }
}
