use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration from config.toml. Every field has a default, so an empty
/// file (or none at all) is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub photos: PhotoConfig,
    #[serde(default)]
    pub notices: NoticeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Root of the web app, used for checklist deep links
    #[serde(default = "default_web_url")]
    pub web_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How many projects the picker lists
    #[serde(default = "default_project_limit")]
    pub project_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            web_url: default_web_url(),
            timeout_secs: default_timeout_secs(),
            project_limit: default_project_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Storage directory; defaults to `$XDG_CACHE_HOME/punchlist`
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoConfig {
    /// Photos kept per task strip
    #[serde(default = "default_per_task_limit")]
    pub per_task_limit: usize,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        PhotoConfig {
            per_task_limit: default_per_task_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeConfig {
    /// Lifetime of a failed-update notice
    #[serde(default = "default_mutation_secs")]
    pub mutation_secs: u64,
    /// Lifetime of informational notices
    #[serde(default = "default_info_secs")]
    pub info_secs: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        NoticeConfig {
            mutation_secs: default_mutation_secs(),
            info_secs: default_info_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.companycam.com/v2".to_string()
}

fn default_web_url() -> String {
    "https://app.companycam.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_project_limit() -> usize {
    100
}

/// Five minutes
fn default_ttl_secs() -> u64 {
    300
}

fn default_per_task_limit() -> usize {
    10
}

fn default_mutation_secs() -> u64 {
    5
}

fn default_info_secs() -> u64 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.api.project_limit, 100);
        assert_eq!(config.photos.per_task_limit, 10);
        assert_eq!(config.notices.mutation_secs, 5);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[api]
base_url = "http://localhost:9000/v2"

[cache]
ttl_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9000/v2");
        assert_eq!(config.api.web_url, "https://app.companycam.com");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.dir.is_none());
    }
}
