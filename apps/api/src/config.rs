use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::matching::normalization::NormalizationMap;
use crate::matching::scoring::ScoringConfig;

/// Service configuration loaded from environment variables.
/// Every variable is optional; the scoring files fall back to built-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// JSON `ScoringConfig` read at startup.
    pub scoring_config_path: Option<PathBuf>,
    /// JSON normalization map. Map edits are written back here.
    pub normalization_map_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            scoring_config_path: optional_path("ATS_SCORING_CONFIG"),
            normalization_map_path: optional_path("ATS_NORMALIZATION_MAP"),
        })
    }
}

fn optional_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Reads and validates a scoring config file. `None` gives the defaults.
pub fn load_scoring_config(path: Option<&Path>) -> Result<ScoringConfig> {
    let Some(path) = path else {
        return Ok(ScoringConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scoring config {}", path.display()))?;
    let config: ScoringConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed scoring config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Rejected scoring config {}", path.display()))?;
    Ok(config)
}

/// Reads a normalization map file. `None`, or a path that does not exist yet,
/// gives the built-in map.
pub fn load_normalization_map(path: Option<&Path>) -> Result<NormalizationMap> {
    let Some(path) = path else {
        return Ok(NormalizationMap::builtin());
    };
    if !path.exists() {
        tracing::info!(
            "Normalization map {} not found, starting from the built-in map",
            path.display()
        );
        return Ok(NormalizationMap::builtin());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read normalization map {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid normalization map {}", path.display()))
}

/// Writes the map to `path` through a uniquely named temp file in the same
/// directory, then renames it over `path`. Readers never see a half-written
/// file and concurrent writers never share a temp path.
pub fn save_normalization_map(path: &Path, map: &NormalizationMap) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), map)
        .context("Failed to serialize normalization map")?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace normalization map {}", path.display()))?;
    tracing::debug!("Saved normalization map to {}", path.display());
    Ok(())
}
