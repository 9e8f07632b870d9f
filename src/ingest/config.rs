// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::sync::NewSyncSource;

const ENV_PATH: &str = "INGEST_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Hour (UTC) reported as the next nightly run.
    pub nightly_hour_utc: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            fetch_timeout_secs: 30,
            nightly_hour_utc: 0,
        }
    }
}

/// Defaults for batches submitted over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionDefaults {
    pub skip_duplicates: bool,
    pub auto_approve: bool,
}

impl Default for IngestionDefaults {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            auto_approve: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub scheduler: SchedulerConfig,
    pub ingestion: IngestionDefaults,
    /// Provider names detected verbatim in chat messages.
    pub known_providers: Vec<String>,
    pub sync_sources: Vec<NewSyncSource>,
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing ingest config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) config/ingest.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("INGEST_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/ingest.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/ingest.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(IngestConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    let cfg = match hint_ext {
        "json" => serde_json::from_str::<IngestConfig>(s)?,
        "toml" => toml::from_str::<IngestConfig>(s)?,
        // Unknown extension: JSON objects start with '{', anything else is TOML.
        _ if s.trim_start().starts_with('{') => serde_json::from_str::<IngestConfig>(s)?,
        _ => toml::from_str::<IngestConfig>(s)?,
    };
    Ok(clean(cfg))
}

fn clean(mut cfg: IngestConfig) -> IngestConfig {
    cfg.known_providers = clean_list(cfg.known_providers);
    cfg.scheduler.nightly_hour_utc = cfg.scheduler.nightly_hour_utc.min(23);
    cfg
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
