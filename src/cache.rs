use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

// unknown top-level keys survive a rewrite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    #[serde(
        rename = "MaxSessionDuration",
        default,
        deserialize_with = "deserialize_durations"
    )]
    pub max_session_duration: BTreeMap<String, u32>,

    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

// A bad hand-edited entry only costs that entry.
fn deserialize_durations<'de, D>(deserializer: D) -> Result<BTreeMap<String, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|(role_arn, value)| {
            match value.as_u64().and_then(|d| u32::try_from(d).ok()) {
                Some(duration) => Some((role_arn, duration)),
                None => {
                    warn!("ignoring invalid cached duration for {}: {}", role_arn, value);
                    None
                }
            }
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct DurationCache {
    path: PathBuf,
}

impl DurationCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        DurationCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> CacheDocument {
        debug!("looking for cache file at: {}", self.path.display());
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no cache file found.");
                return CacheDocument::default();
            }
            Err(e) => {
                warn!(
                    "cache file {} can't be read, proceeding without cache: {}",
                    self.path.display(),
                    e
                );
                return CacheDocument::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(e) => {
                // usually a previous write that was cut short
                warn!(
                    "cache file {} is corrupt, proceeding as if there was no cache: {}",
                    self.path.display(),
                    e
                );
                CacheDocument::default()
            }
        }
    }

    pub fn max_duration(&self, role_arn: &str) -> Option<u32> {
        let duration = self
            .load()
            .max_session_duration
            .get(role_arn)
            .copied()
            .filter(|&d| d > 0);
        if duration.is_none() {
            debug!("no max duration found for role {} in cache.", role_arn);
        }
        duration
    }

    /// Returns whether the file was rewritten; only a larger duration is written.
    pub fn record_success(&self, role_arn: &str, duration_seconds: u32) -> anyhow::Result<bool> {
        let mut document = self.load();
        let current = document
            .max_session_duration
            .get(role_arn)
            .copied()
            .unwrap_or(0);
        if duration_seconds <= current {
            debug!(
                "cached duration {}s for {} already covers {}s",
                current, role_arn, duration_seconds
            );
            return Ok(false);
        }

        document
            .max_session_duration
            .insert(role_arn.to_string(), duration_seconds);
        self.write(&document)?;
        Ok(true)
    }

    fn write(&self, document: &CacheDocument) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                debug!("creating directory: {}", dir.display());
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }

        debug!("writing cache to: {}", self.path.display());
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
