use crate::index::types::IndexConfig;
use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "stmtrie";
const CONFIG_FILE: &str = "config.json";

/// Load the run configuration.
///
/// An explicit `path` must exist and parse. Without one, `config.json` in the
/// app data directory is used when present, otherwise all defaults.
pub fn load_config(path: Option<&Path>) -> Result<IndexConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = get_config_path()?;
            if !default_path.exists() {
                return Ok(IndexConfig::default());
            }
            default_path
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: IndexConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Directory holding the index files for `config`
pub fn resolve_data_dir(config: &IndexConfig) -> Result<PathBuf> {
    match &config.data_path {
        Some(dir) => Ok(dir.clone()),
        None => get_index_dir(&config.source_dir),
    }
}

/// Get the path to the default config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory for storing indexes
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Default index directory for a corpus root
pub fn get_index_dir(source_dir: &Path) -> Result<PathBuf> {
    let indexes_dir = get_app_data_dir()?.join("indexes");
    fs::create_dir_all(&indexes_dir)?;
    Ok(indexes_dir.join(hash_path(source_dir)))
}

/// Folder name for a path: sanitized directory name + path hash
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let dir_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("root");
    let sanitized: String = dir_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();

    let mut hasher = DefaultHasher::new();
    canonical.to_string_lossy().hash(&mut hasher);
    format!("{}-{:016x}", sanitized, hasher.finish())
}

/// Delete every index file in `dir`
pub fn remove_index_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove index at {}", dir.display()))?;
    }
    Ok(())
}
