use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILE: &str = "warplay.toml";

/// Top-level configuration, read from `warplay.toml` when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Verification service settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Level catalog settings
    #[serde(default)]
    pub levels: LevelConfig,
}

/// Verification service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the verification service
    #[serde(default = "default_backend_url")]
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

fn default_backend_url() -> String {
    "https://ctf-backend-5yhk.onrender.com".to_string()
}

/// Level catalog configuration - how level numbers map to images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Image repository that hosts one tag per level
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Tag prefix; level n is tagged `<prefix><n>`
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Number of levels in the game
    #[serde(default = "default_total")]
    pub total: u32,

    /// Level that keeps its image's native entry point instead of /bin/sh
    #[serde(default = "default_native_entrypoint_level")]
    pub native_entrypoint_level: u32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            tag_prefix: default_tag_prefix(),
            total: default_total(),
            native_entrypoint_level: default_native_entrypoint_level(),
        }
    }
}

fn default_repository() -> String {
    "ghcr.io/avadhutmali/linuxdiary6.0-wargames-level".to_string()
}

fn default_tag_prefix() -> String {
    "war".to_string()
}

fn default_total() -> u32 {
    10
}

fn default_native_entrypoint_level() -> u32 {
    6
}

impl Config {
    /// Load configuration from `warplay.toml` in the given directory,
    /// falling back to defaults when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.levels.total, 10);
        assert_eq!(config.levels.tag_prefix, "war");
        assert_eq!(config.levels.native_entrypoint_level, 6);
        assert!(config.backend.url.starts_with("https://"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.levels.total, 10);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("warplay.toml"),
            "[levels]\ntotal = 12\n\n[backend]\nurl = \"http://localhost:3000\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.levels.total, 12);
        assert_eq!(config.backend.url, "http://localhost:3000");
        // Unspecified fields keep their defaults
        assert_eq!(config.levels.tag_prefix, "war");
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("warplay.toml"), "not toml [").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
