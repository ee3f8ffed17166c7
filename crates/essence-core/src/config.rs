use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{DEFAULT_USER_LANGUAGE, RetryPolicy, WebhookClient};
use crate::persist::PerformanceMode;
use crate::storage::{DEFAULT_NAMESPACE, FileBackend, Storage};
use crate::error::RecipeError;

pub const PROJECT_CONFIG: &str = ".essence/config.toml";
pub const USER_CONFIG: &str = "essence/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EssenceConfig {
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_language")]
    pub user_language: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
            user_language: default_user_language(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            retention_days: default_retention_days(),
            dir: None,
        }
    }
}

impl StorageConfig {
    /// Configured directory, else the platform data dir, else
    /// `.essence/storage` under `project_root`.
    #[must_use]
    pub fn resolved_dir(&self, project_root: &Path) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir().map_or_else(
                || project_root.join(".essence/storage"),
                |dir| dir.join("essence"),
            )
        })
    }

    /// File-backed storage rooted at `dir`.
    pub fn open(&self, dir: &Path) -> Result<Storage, RecipeError> {
        let backend = FileBackend::open(dir)?;
        Ok(
            Storage::new(std::sync::Arc::new(backend), self.namespace.clone()).with_retention(
                chrono::TimeDelta::days(i64::from(self.retention_days)),
            ),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default)]
    pub performance_mode: PerformanceMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl EssenceConfig {
    /// Webhook client for this config, or a config error when no URL is set.
    pub fn webhook_client(&self) -> Result<WebhookClient, RecipeError> {
        let url = self
            .webhook
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                RecipeError::Config(
                    "no webhook URL configured (set [webhook] url or ESSENCE_WEBHOOK_URL)".into(),
                )
            })?;
        Ok(WebhookClient::http(url)
            .with_timeout(Duration::from_millis(self.webhook.timeout_ms))
            .with_policy(self.retry.policy())
            .with_user_language(self.webhook.user_language.clone()))
    }
}

/// Parse one config file into a TOML table. Missing files yield `None`.
fn load_table(path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let table = toml::from_str::<toml::Table>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(table))
}

/// Overlay `top` onto `base`, recursing into tables.
fn merge_tables(base: &mut toml::Table, top: toml::Table) {
    for (key, value) in top {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// User file first, project file on top, then environment overrides.
pub fn resolve_config(project_root: &Path) -> Result<EssenceConfig> {
    let user_path = dirs::config_dir().map(|dir| dir.join(USER_CONFIG));
    resolve_config_from(
        &project_root.join(PROJECT_CONFIG),
        user_path.as_deref(),
        |key| std::env::var(key).ok(),
    )
}

pub fn resolve_config_from(
    project_path: &Path,
    user_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<EssenceConfig> {
    let mut merged = toml::Table::new();
    if let Some(user_path) = user_path
        && let Some(user) = load_table(user_path)?
    {
        merged = user;
    }
    if let Some(project) = load_table(project_path)? {
        merge_tables(&mut merged, project);
    }

    let mut config: EssenceConfig = toml::Value::Table(merged)
        .try_into()
        .with_context(|| format!("Invalid configuration in {}", project_path.display()))?;
    apply_env(&mut config, env)?;
    Ok(config)
}

fn apply_env(config: &mut EssenceConfig, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = non_empty("ESSENCE_WEBHOOK_URL") {
        config.webhook.url = Some(url);
    }
    if let Some(dir) = non_empty("ESSENCE_STORAGE_DIR") {
        config.storage.dir = Some(PathBuf::from(dir));
    }
    if let Some(bind) = non_empty("ESSENCE_BIND") {
        config.server.bind = bind;
    }
    if let Some(mode) = non_empty("ESSENCE_PERFORMANCE_MODE") {
        config.autosave.performance_mode = mode
            .parse()
            .context("Invalid ESSENCE_PERFORMANCE_MODE")?;
    }
    if config.retry.multiplier < 1.0 {
        bail!(
            "[retry] multiplier must be at least 1.0, got {}",
            config.retry.multiplier
        );
    }
    Ok(())
}

const fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_language() -> String {
    DEFAULT_USER_LANGUAGE.to_string()
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

const fn default_retention_days() -> u32 {
    7
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
