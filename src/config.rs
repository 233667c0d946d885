use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ClickSightError, ClickSightResult};
use crate::perception::resolver::DensityHeuristic;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on everything that happens before a click is dispatched.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_bind() -> String {
    "0.0.0.0:8001".into()
}

fn default_request_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Relative paths resolve against the working directory. Empty means the
    /// platform data directory.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

impl StorageConfig {
    pub fn results_path(&self) -> PathBuf {
        if !self.results_dir.is_empty() {
            return PathBuf::from(&self.results_dir);
        }
        match dirs::data_local_dir() {
            Some(base) => base.join("clicksight").join("results"),
            None => PathBuf::from(default_results_dir()),
        }
    }
}

fn default_results_dir() -> String {
    "results".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub density: DensityHeuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default = "default_radius")]
    pub radius: u32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
        }
    }
}

fn default_radius() -> u32 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Pause between the click and the post-click cursor read.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_settle_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions URL.
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
    /// Optional API key stored in config.toml (env var CLICKSIGHT_<ID>_API_KEY wins).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    128
}

fn resolve_config_path() -> ClickSightResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(ClickSightError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> ClickSightResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    let density = &config.resolver.density;
    if !(density.scale.is_finite() && density.scale > 0.0) {
        return Err(ClickSightError::Config(format!(
            "resolver.density.scale must be positive, got {}",
            density.scale
        )));
    }
    Ok(config)
}

pub fn load_config() -> ClickSightResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.model.active_provider,
        bind = %config.server.bind,
        "config loaded"
    );
    Ok(config)
}
