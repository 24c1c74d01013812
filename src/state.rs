//! Configuration loading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Config;

/// Environment variable that overrides `duplicateSimilarityPercent`.
pub const SIMILARITY_PERCENT_ENV: &str = "DUPLICATE_SIMILARITY_PERCENT";

/// Path of the config file: ~/.townrecords/config.json
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".townrecords").join("config.json"))
}

/// Load configuration from ~/.townrecords/config.json, then apply
/// environment overrides. A missing file yields defaults.
pub fn load_config() -> Result<Config, String> {
    let mut config = load_config_from(&config_path()?)?;
    apply_env_overrides(&mut config, std::env::var(SIMILARITY_PERCENT_ENV).ok());
    Ok(config)
}

/// Load configuration from an explicit file. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply the similarity-percent override. Unparseable values are ignored.
pub fn apply_env_overrides(config: &mut Config, similarity_percent: Option<String>) {
    let Some(raw) = similarity_percent else {
        return;
    };
    match raw.trim().parse::<u32>() {
        Ok(percent) => config.duplicate_similarity_percent = percent,
        Err(_) => log::warn!(
            "Ignoring {}={:?}: not a non-negative integer",
            SIMILARITY_PERCENT_ENV,
            raw
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.duplicate_similarity_percent, 20);
        assert_eq!(config.full_search_limit, 50);
    }

    #[test]
    fn test_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"databasePath": "/srv/records.db", "duplicateSimilarityPercent": 30}"#,
        )
        .unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.database_path.as_deref(), Some("/srv/records.db"));
        assert_eq!(config.duplicate_similarity_percent, 30);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, Some(" 35 ".into()));
        assert_eq!(config.duplicate_similarity_percent, 35);

        apply_env_overrides(&mut config, Some("lots".into()));
        assert_eq!(config.duplicate_similarity_percent, 35);

        apply_env_overrides(&mut config, None);
        assert_eq!(config.duplicate_similarity_percent, 35);
    }
}
