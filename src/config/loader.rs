//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/palmer/config.toml)
//! 3. Project config (.palmer/config.toml)
//! 4. Environment variables (PALMER_* prefix, `__` separates sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{PalmerError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Resolution chain with explicit file locations
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // PALMER_LLM__MODEL -> llm.model, PALMER_AGENTS__RETRY__MAX_ATTEMPTS -> agents.retry.max_attempts
        figment = figment.merge(Env::prefixed("PALMER_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| PalmerError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| PalmerError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/palmer/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("palmer"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to global cache directory (page cache)
    pub fn global_cache_dir() -> Option<PathBuf> {
        env::var("XDG_CACHE_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".cache"))
            })
            .map(|p| p.join("palmer"))
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".palmer")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        if let Some(cache) = Self::global_cache_dir() {
            let exists = if cache.exists() { "✓" } else { "✗" };
            println!("  Cache:   {} {}", exists, cache.display());
        }
    }

    /// Show current effective configuration as toml, json or yaml
    pub fn show_config(format: &str) -> Result<()> {
        let config = Self::load()?;

        let rendered = match format {
            "json" => serde_json::to_string_pretty(&config)?,
            "yaml" => serde_yaml::to_string(&config)?,
            _ => toml::to_string_pretty(&config).map_err(|e| PalmerError::Config(e.to_string()))?,
        };
        println!("{}", rendered);

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            PalmerError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_default(&global_dir, force)?;

        if let Some(cache_dir) = Self::global_cache_dir() {
            fs::create_dir_all(&cache_dir)?;
        }

        Ok(global_dir)
    }

    /// Initialize project configuration in `.palmer/`
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        Self::write_default(&project_dir, force)?;
        Ok(project_dir)
    }

    fn write_default(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Generate default config content (TOML)
    fn default_config_toml() -> &'static str {
        r#"# Palmer Configuration
# Project settings in .palmer/config.toml override ~/.config/palmer/config.toml.

version = "1.0"

[agents]
attempt_timeout_secs = 120

[agents.circuit_breaker]
failure_threshold = 5
recovery_timeout_secs = 60

[agents.retry]
max_attempts = 3
base_delay_ms = 1000
max_delay_ms = 60000
exponential_base = 2.0

[coordinator]
default_strategy = "parallel"
default_analysis_type = "comprehensive"

[http]
timeout_secs = 30

# Conversational agent. Set OPENAI_API_KEY (or PALMER_LLM__API_KEY) to enable.
[llm]
provider = "openai"
model = "gpt-4o-mini"
timeout_secs = 60

[cache]
enabled = true
ttl_hours = 24
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ExecutionStrategy;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            ConfigLoader::load_from(None, &temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_project_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        fs::write(
            &global,
            "[agents.retry]\nmax_attempts = 7\n[coordinator]\ndefault_strategy = \"adaptive\"\n",
        )
        .unwrap();
        fs::write(&project, "[agents.retry]\nmax_attempts = 4\n").unwrap();

        let config = ConfigLoader::load_from(Some(&global), &project).unwrap();
        assert_eq!(config.agents.retry.max_attempts, 4);
        assert_eq!(
            config.coordinator.default_strategy,
            ExecutionStrategy::Adaptive
        );
    }

    #[test]
    fn test_default_file_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::write_default(temp_dir.path(), false).unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.agents.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[agents.circuit_breaker]\nfailure_threshold = 0\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_env_override() {
        // SAFETY: only this test sets the variable
        unsafe {
            env::set_var("PALMER_HTTP__USER_AGENT", "env-agent");
        }
        let temp_dir = TempDir::new().unwrap();
        let config =
            ConfigLoader::load_from(None, &temp_dir.path().join("missing.toml")).unwrap();
        unsafe {
            env::remove_var("PALMER_HTTP__USER_AGENT");
        }
        assert_eq!(config.http.user_agent, "env-agent");
    }
}
