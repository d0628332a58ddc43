//! Executor configuration: defaults, env overlay and JSON file loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_true() -> bool { true }
fn default_cache_max_entries() -> usize { 10_000 }
fn default_models_database() -> String { "mindsdb".to_string() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Global switch for the prediction cache; a session can still opt out.
    #[serde(default = "default_true")]
    pub predictor_cache: bool,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Database name attached to predictor output columns.
    #[serde(default = "default_models_database")]
    pub models_database: String,
    #[serde(default)]
    pub default_database: Option<String>,
    /// When set, process marks are also written as files under `<dir>/<kind>/<id>`.
    #[serde(default)]
    pub process_marks_dir: Option<PathBuf>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            predictor_cache: true,
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_secs: None,
            models_database: default_models_database(),
            default_database: None,
            process_marks_dir: None,
        }
    }
}

fn env_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ExecConfig {
    /// Defaults overlaid with `CONFLUX_*` environment variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: ExecConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg)
    }

    pub(crate) fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, get: F) {
        if let Some(b) = get("CONFLUX_PREDICTOR_CACHE").as_deref().and_then(env_bool) { self.predictor_cache = b; }
        if let Some(n) = get("CONFLUX_CACHE_MAX_ENTRIES").and_then(|v| v.trim().parse::<usize>().ok()) { self.cache_max_entries = n; }
        if let Some(n) = get("CONFLUX_CACHE_TTL_SECS").and_then(|v| v.trim().parse::<u64>().ok()) { self.cache_ttl_secs = Some(n); }
        if let Some(v) = get("CONFLUX_MODELS_DATABASE").filter(|v| !v.trim().is_empty()) { self.models_database = v; }
        if let Some(v) = get("CONFLUX_DEFAULT_DATABASE").filter(|v| !v.trim().is_empty()) { self.default_database = Some(v); }
        if let Some(v) = get("CONFLUX_PROCESS_MARKS_DIR").filter(|v| !v.trim().is_empty()) { self.process_marks_dir = Some(PathBuf::from(v)); }
    }
}
