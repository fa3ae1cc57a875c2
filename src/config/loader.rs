//! Configuration loader with tier-based merging.

use super::merge::merge_layer;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `./project-board/config.yaml`
    Project = 1,
    /// `~/.project-board/config.yaml`
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration directories from the environment and defaults.
    pub fn discover() -> Self {
        let project_dir = std::env::var("PROJECT_BOARD_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("project-board")));

        let user_dir = std::env::var("PROJECT_BOARD_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".project-board")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit tier directories.
    ///
    /// `PROJECT_BOARD_CONFIG_PATH`, when set, short-circuits the file tiers and
    /// loads that single file; environment overrides still apply on top.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        if let Ok(explicit_path) = std::env::var("PROJECT_BOARD_CONFIG_PATH") {
            let path = PathBuf::from(&explicit_path);
            let mut config = Config::load(&path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            Self::apply_env_overrides(&mut config);
            return Ok(Self {
                paths,
                config,
                sources: vec![(ConfigTier::Project, path)],
            });
        }

        let mut merged = serde_json::to_value(Config::default())?;
        let mut sources = Vec::new();

        let tiers = [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ];
        for (tier, dir) in tiers {
            let Some(dir) = dir else { continue };
            let file = dir.join("config.yaml");
            if let Some(layer) = read_layer(&file, tier) {
                merge_layer(&mut merged, layer);
                sources.push((tier, file));
            }
        }

        let mut config: Config = serde_json::from_value(merged)?;
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides (highest tier).
    fn apply_env_overrides(config: &mut Config) {
        if let Ok(dir) = std::env::var("PROJECT_BOARD_DIR") {
            config.board.dir = PathBuf::from(dir);
        }

        if let Ok(schema) = std::env::var("PROJECT_BOARD_SCHEMA_PATH") {
            config.board.schema_path = Some(PathBuf::from(schema));
        }

        if let Ok(timeout) = std::env::var("PROJECT_BOARD_LOCK_TIMEOUT_SECS") {
            match timeout.parse::<f64>() {
                Ok(secs) => config.board.lock_timeout_secs = secs,
                Err(_) => warn!(
                    value = %timeout,
                    "Ignoring non-numeric PROJECT_BOARD_LOCK_TIMEOUT_SECS"
                ),
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that contributed to the merged result.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

/// Read one tier's YAML file. Missing files are skipped silently; unreadable
/// or malformed ones are skipped with a warning.
fn read_layer(file: &Path, tier: ConfigTier) -> Option<Value> {
    if !file.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            warn!(tier = %tier, path = %file.display(), error = %e, "Skipping unreadable config");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Null) => None,
        Ok(value) => {
            debug!(tier = %tier, path = %file.display(), "Loaded config tier");
            Some(value)
        }
        Err(e) => {
            warn!(tier = %tier, path = %file.display(), error = %e, "Skipping malformed config");
            None
        }
    }
}
