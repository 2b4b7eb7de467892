//! Configuration for copyforge.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (COPYFORGE_HOME)
//! 2. Config file (.copyforge/config.yaml)
//! 3. Defaults (~/.copyforge)
//!
//! Config file discovery:
//! - Searches current directory and parents for .copyforge/config.yaml
//! - `paths.home` in the config file is relative to the .copyforge/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::FabricPatterns;
use crate::core::RunLimits;
use crate::domain::ReviewConfig;

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "COPYFORGE_HOME";

const CONFIG_DIR: &str = ".copyforge";
const CONFIG_FILE: &str = "config.yaml";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub limits: RunLimits,
    #[serde(default)]
    pub review: Option<ReviewConfig>,
    #[serde(default)]
    pub fabric: FabricConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .copyforge/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FabricConfig {
    /// Fabric binary; detected when omitted
    pub binary: Option<String>,
    #[serde(default)]
    pub patterns: FabricPatterns,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to copyforge home (records, history)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub limits: RunLimits,
    /// Review steps used when `--review` is given
    pub review: ReviewConfig,
    pub fabric: FabricConfig,
}

impl ResolvedConfig {
    pub fn records_dir(&self) -> PathBuf {
        self.home.join("records")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Combine an optional config file with the env override and default home
fn resolve_config(
    config_file: Option<PathBuf>,
    env_home: Option<PathBuf>,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let file = config_file.as_deref().map(load_config_file).transpose()?;

    let file_home = match (&file, &config_file) {
        (Some(file), Some(path)) => file.paths.home.as_deref().map(|home| {
            let config_dir = path.parent().unwrap_or(Path::new("."));
            resolve_path(config_dir, home)
        }),
        _ => None,
    };

    let home = env_home.or(file_home).unwrap_or(default_home);

    let (limits, review, fabric) = match file {
        Some(file) => (file.limits, file.review.unwrap_or_default(), file.fabric),
        None => Default::default(),
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        limits,
        review,
        fabric,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);
    let env_home = std::env::var(HOME_ENV).ok().map(PathBuf::from);

    resolve_config(find_config_file(), env_home, default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the records directory ($COPYFORGE_HOME/records)
pub fn records_dir() -> Result<PathBuf> {
    Ok(config()?.records_dir())
}
