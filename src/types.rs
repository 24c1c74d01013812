use serde::{Deserialize, Serialize};

use crate::duplicates::DEFAULT_SIMILARITY_PERCENT;

/// Configuration stored in ~/.townrecords/config.json
///
/// Every field has a default, so a missing or partial file still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite file. Defaults to ~/.townrecords/townrecords.db when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Similar-match tolerance as a percentage of normalized name length.
    #[serde(default = "default_similarity_percent")]
    pub duplicate_similarity_percent: u32,
    #[serde(default = "default_quick_search_limit")]
    pub quick_search_limit: usize,
    #[serde(default = "default_full_search_limit")]
    pub full_search_limit: usize,
    /// Pacing of the background duplicate detection loop.
    #[serde(default = "default_detection_interval_hours")]
    pub detection_interval_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            duplicate_similarity_percent: default_similarity_percent(),
            quick_search_limit: default_quick_search_limit(),
            full_search_limit: default_full_search_limit(),
            detection_interval_hours: default_detection_interval_hours(),
        }
    }
}

fn default_similarity_percent() -> u32 {
    DEFAULT_SIMILARITY_PERCENT
}

fn default_quick_search_limit() -> usize {
    8
}

fn default_full_search_limit() -> usize {
    50
}

fn default_detection_interval_hours() -> u64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"fullSearchLimit": 100}"#).unwrap();
        assert_eq!(config.full_search_limit, 100);
        assert_eq!(config.quick_search_limit, 8);
        assert_eq!(config.duplicate_similarity_percent, 20);
        assert_eq!(config.detection_interval_hours, 24);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_empty_object_matches_default() {
        let parsed: Config = serde_json::from_str("{}").unwrap();
        let default = Config::default();
        assert_eq!(parsed.duplicate_similarity_percent, default.duplicate_similarity_percent);
        assert_eq!(parsed.full_search_limit, default.full_search_limit);
    }
}
