//! Per-lake storage of processed product data, so reruns skip the fetch.
//!
//! Each (lake, source) pair is one bincode blob under the lake's save-files directory.
//! The blob carries a small header (lake id, source name and a description of the
//! settings that produced it) that is checked on read; a blob written for another lake,
//! source or settings is a miss rather than silently reused.

pub mod error;

use crate::types::lake::Lake;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::{NaiveDateTime, Utc};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use error::CacheError;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

#[derive(Serialize, Deserialize)]
struct CacheEnvelope<T> {
    lake_id: u64,
    source: String,
    settings: String,
    written_at: NaiveDateTime,
    payload: T,
}

/// Cache of processed product data for one lake.
#[derive(Debug, Clone)]
pub struct ProductCache {
    dir: PathBuf,
    lake_id: u64,
    lake_name: String,
    bypass: bool,
}

impl ProductCache {
    /// A cache in `dir` for `lake`. With `bypass` set every load is a miss, which forces
    /// products to be fetched again; stores still happen.
    pub fn new(dir: &Path, lake: &Lake, bypass: bool) -> Self {
        Self {
            dir: dir.to_path_buf(),
            lake_id: lake.id,
            lake_name: lake.name.clone(),
            bypass,
        }
    }

    /// `<dir>/<lake_name>_<source>.bin`
    pub fn path_for(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.bin", self.lake_name, source))
    }

    /// Reads the cached payload for `source` produced with `settings`.
    ///
    /// Returns `Ok(None)` on a miss: no file, bypass mode, or a header written for
    /// another lake, source or settings.
    pub async fn load<T>(&self, source: &str, settings: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.bypass {
            info!("Running cleanly, ignoring cached {} data", source);
            return Ok(None);
        }
        let path = self.path_for(source);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!("No saved {} data found at {}", source, path.display());
            return Ok(None);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CacheError::CacheRead(path.clone(), e))?;
        let envelope = tokio::task::spawn_blocking({
            let path = path.clone();
            move || {
                bincode::serde::decode_from_slice::<CacheEnvelope<T>, _>(&bytes, BINCODE_CONFIG)
                    .map(|(envelope, _)| envelope)
                    .map_err(|e| CacheError::CacheDecode(path, Box::new(e)))
            }
        })
        .await??;

        if envelope.lake_id != self.lake_id || envelope.source != source {
            warn!(
                "Cache file {} belongs to lake {} / {}, not lake {} / {}; ignoring it",
                path.display(),
                envelope.lake_id,
                envelope.source,
                self.lake_id,
                source
            );
            return Ok(None);
        }
        if envelope.settings != settings {
            warn!(
                "Cache file {} was written with settings '{}', not '{}'; ignoring it",
                path.display(),
                envelope.settings,
                settings
            );
            return Ok(None);
        }
        info!(
            "Read saved {} data from {} (written {})",
            source,
            path.display(),
            envelope.written_at
        );
        Ok(Some(envelope.payload))
    }

    /// Writes `payload` for `source` produced with `settings`, returning the file path.
    pub async fn store<T>(
        &self,
        source: &str,
        settings: &str,
        payload: Arc<T>,
    ) -> Result<PathBuf, CacheError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::CacheDirCreation(self.dir.clone(), e))?;
        let path = self.path_for(source);

        let cache_start = std::time::Instant::now();
        let bincode_data = tokio::task::spawn_blocking({
            let lake_id = self.lake_id;
            let source = source.to_string();
            let settings = settings.to_string();
            move || {
                let envelope = CacheEnvelope {
                    lake_id,
                    source,
                    settings,
                    written_at: Utc::now().naive_utc(),
                    payload: &*payload,
                };
                bincode::serde::encode_to_vec(&envelope, BINCODE_CONFIG)
                    .map_err(|e| CacheError::CacheEncode(Box::new(e)))
            }
        })
        .await??;
        tokio::fs::write(&path, &bincode_data)
            .await
            .map_err(|e| CacheError::CacheWrite(path.clone(), e))?;
        info!(
            "Serialized and wrote cache ({} bytes) to {} in {:?}",
            bincode_data.len(),
            path.display(),
            cache_start.elapsed()
        );
        Ok(path)
    }
}
