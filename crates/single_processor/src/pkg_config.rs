use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use llm_requester::ModelConfig;
use log::{debug, info};
use response_parser::Severity;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::context::Task;

/// Compiled-in defaults, the lowest configuration layer.
const DEFAULT_CONFIG: &str = include_str!("../../../config/config.default.toml");

/// Ordered search locations for `config.toml` relative to the working directory.
const CONFIG_SEARCH_PATHS: &[&str] = &["config/config.toml", "../config/config.toml"];

fn default_cache_dir() -> PathBuf {
    PathBuf::from("build/batchai")
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_severity() -> Severity {
    Severity::Minor
}

/// `[check]`, `[review]` and `[test]` sections.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub model_id: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub rules: Vec<String>,
    /// Inline template replacing the prompt file.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
    pub check: TaskConfig,
    pub review: TaskConfig,
    pub test: TaskConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl AppConfig {
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn task(&self, task: Task) -> &TaskConfig {
        match task {
            Task::Check => &self.check,
            Task::Review => &self.review,
            Task::Test => &self.test,
        }
    }
}

/// Locate the user config file: the explicit path if given, otherwise the
/// first existing search location.
fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let home = dirs::home_dir().map(|h| h.join("batchai").join("batchai.toml"));
    let candidates = CONFIG_SEARCH_PATHS
        .iter()
        .map(PathBuf::from)
        .chain(home);

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        debug!("No config at {}", candidate.display());
    }
    Ok(None)
}

fn build_config(user_file: Option<&Path>) -> Result<Config> {
    let mut builder =
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
    if let Some(path) = user_file {
        builder = builder.add_source(File::from(path.to_path_buf()));
    }
    builder
        .add_source(
            Environment::with_prefix("BATCHAI")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")
}

/// Loads the layered configuration and resolves `cache_dir` against `cwd`.
pub fn load_app_config(explicit: Option<&Path>, cwd: &Path) -> Result<AppConfig> {
    let user_file = locate_config_file(explicit)?;
    match &user_file {
        Some(path) => info!("Using config file {}", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }

    let mut config: AppConfig = build_config(user_file.as_deref())?
        .try_deserialize()
        .context("Invalid configuration")?;

    if config.cache_dir.is_relative() {
        config.cache_dir = cwd.join(&config.cache_dir);
    }
    if let Some(dir) = config.prompts_dir.take() {
        config.prompts_dir = Some(if dir.is_relative() { cwd.join(dir) } else { dir });
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_load() {
        let cwd = TempDir::new().unwrap();
        let config: AppConfig = build_config(None).unwrap().try_deserialize().unwrap();
        assert_eq!(config.lang, "en");
        assert_eq!(config.check.severity, Severity::Minor);
        assert!(config.model(&config.check.model_id).is_some());
        assert!(!config.check.rules.is_empty());
        assert!(cwd.path().is_dir());
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("batchai.toml");
        std::fs::write(
            &file,
            "lang = \"zh\"\ncache_dir = \"cache\"\n[review]\nmodel_id = \"local\"\nseverity = \"major\"\n",
        )
        .unwrap();

        let config = load_app_config(Some(&file), dir.path()).unwrap();
        assert_eq!(config.lang, "zh");
        assert_eq!(config.review.model_id, "local");
        assert_eq!(config.review.severity, Severity::Major);
        assert_eq!(config.cache_dir, dir.path().join("cache"));
        assert_eq!(config.check.model_id, "openai:gpt-4o-mini");
    }

    #[test]
    fn test_missing_explicit_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(load_app_config(Some(&dir.path().join("nope.toml")), dir.path()).is_err());
    }
}
