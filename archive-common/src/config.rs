//! Configuration loading for the archive services
//!
//! Resolution priority:
//! 1. `ARCHIVE_CONFIG` environment variable (path to a TOML file)
//! 2. Platform config directory (`<config_dir>/archive/config.toml`)
//! 3. Compiled defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service configuration loaded from TOML
///
/// Every field has a compiled default so a missing config file is not an
/// error; partial files override only the keys they name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Bind address for the works service
    pub bind_address: String,
    /// SQLite database path (":memory:" for ephemeral)
    pub database_path: String,
    /// Base URL of the external search/index service
    pub search_index_url: String,
    /// Maximum works per import for a regular user
    pub import_max_works: usize,
    /// Maximum works per import for an archivist
    pub import_max_works_by_archivist: usize,
    /// Maximum URLs when importing chapters into a single work
    pub import_max_chapters: usize,
    /// Per-URL fetch timeout for imports, in seconds
    pub import_timeout_secs: u64,
    /// Days an unposted draft is retained before automatic deletion
    pub draft_expiry_days: i64,
    /// Number of initial result pages eligible for the read-through cache
    pub pages_to_cache: u32,
    /// Cache TTL for cached result pages, in seconds
    pub cache_ttl_secs: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5740".to_string(),
            database_path: "archive.db".to_string(),
            search_index_url: "http://127.0.0.1:5741".to_string(),
            import_max_works: 10,
            import_max_works_by_archivist: 50,
            import_max_chapters: 50,
            import_timeout_secs: 30,
            draft_expiry_days: 31,
            pages_to_cache: 5,
            cache_ttl_secs: 20 * 60,
        }
    }
}

impl TomlConfig {
    /// Load configuration following the resolution priority order
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("ARCHIVE_CONFIG") {
            return Self::from_file(&PathBuf::from(path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Parse configuration from a specific TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Import ceiling for the given role
    pub fn import_cap(&self, archivist: bool) -> usize {
        if archivist {
            self.import_max_works_by_archivist
        } else {
            self.import_max_works
        }
    }
}

/// Platform config file location (`<config_dir>/archive/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("archive").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_carry_archive_constants() {
        let config = TomlConfig::default();
        assert_eq!(config.import_max_works, 10);
        assert_eq!(config.import_max_works_by_archivist, 50);
        assert_eq!(config.import_max_chapters, 50);
        assert_eq!(config.draft_expiry_days, 31);
    }

    #[test]
    fn import_cap_depends_on_role() {
        let config = TomlConfig::default();
        assert_eq!(config.import_cap(false), 10);
        assert_eq!(config.import_cap(true), 50);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "import_max_works = 3").unwrap();

        let config = TomlConfig::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.import_max_works, 3);
        assert_eq!(config.import_max_chapters, 50); // default retained
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "import_max_works = \"not a number\"").unwrap();

        let result = TomlConfig::from_file(&file.path().to_path_buf());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
