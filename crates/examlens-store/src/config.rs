//! Configuration file loading and store factory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examlens_core::engine::AnalysisConfig;
use examlens_core::traits::SnapshotStore;

use crate::json::JsonDirStore;
use crate::memory::MemoryStore;

/// Environment variable overriding the JSON store directory.
pub const STORE_DIR_ENV: &str = "EXAMLENS_STORE_DIR";

/// Where snapshots are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Json {
        #[serde(default = "default_store_dir")]
        dir: PathBuf,
    },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Json {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./examlens-data")
}

/// Top-level examlens configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamlensConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Commented starter configuration written by `examlens init`.
pub const STARTER_CONFIG: &str = r#"# examlens configuration

[analysis]
# Maximum marks per subject
max_marks = 100.0
# Pass mark as a percentage of max_marks
pass_threshold = 50.0
# Minimum name similarity (0..1) for two spellings to count as one student
similarity_threshold = 0.8
# Flag identities that absorbed this many spellings (0 disables)
ambiguous_cluster_size = 3
# Sort names before clustering so results do not depend on upload order
sort_names_before_clustering = false
# A student improved/declined when their total moved by more than this
student_trend_threshold = 5.0
# The class improved/declined when the mean total change exceeds this
class_trend_threshold = 2.0
# Students whose total moved by at most this are consistent performers
consistency_band = 5.0
# Entries per leaderboard
leaderboard_size = 3

[store]
type = "json"
dir = "./examlens-data"
# dir = "${HOME}/.local/share/examlens"
"#;

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables expand to nothing.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + len];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + len + 1..]);
        from = start + value.len();
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examlens.toml` in the current directory
/// 2. `~/.config/examlens/config.toml`
///
/// Environment variable override: `EXAMLENS_STORE_DIR`.
pub fn load_config() -> Result<ExamlensConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamlensConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examlens.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamlensConfig::default(),
    };

    if let Ok(dir) = std::env::var(STORE_DIR_ENV) {
        config.store = StoreConfig::Json {
            dir: PathBuf::from(dir),
        };
    }

    Ok(config)
}

/// Parse TOML config text and expand `${VAR}` references in paths.
pub fn parse_config_str(content: &str) -> Result<ExamlensConfig> {
    let mut config: ExamlensConfig = toml::from_str(content)?;
    if let StoreConfig::Json { dir } = &mut config.store {
        *dir = PathBuf::from(resolve_env_vars(&dir.to_string_lossy()));
    }
    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examlens"))
}

/// Create a snapshot store from its configuration.
pub fn create_store(config: &StoreConfig) -> Box<dyn SnapshotStore> {
    match config {
        StoreConfig::Json { dir } => Box::new(JsonDirStore::new(dir.clone())),
        StoreConfig::Memory => Box::new(MemoryStore::new()),
    }
}
