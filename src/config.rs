use crate::cache::DEFAULT_TTL;
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Longest accepted cache TTL; larger settings are clamped to it.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Runtime settings for the console.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub cache_ttl: Duration,
    /// Directory for the file cache; `None` keeps dropdown data in memory only.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            api_url: DEFAULT_API_URL.to_string(),
            cache_ttl: DEFAULT_TTL,
            cache_dir: None,
        }
    }
}

impl ConsoleConfig {
    /// Read `REPORT_API_URL`, `REPORT_CACHE_TTL_SECS` and `REPORT_CACHE_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ConsoleConfig::default();

        if let Some(url) = lookup("REPORT_API_URL").filter(|u| !u.trim().is_empty()) {
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("REPORT_CACHE_TTL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > MAX_CACHE_TTL.as_secs() => {
                    warn!(
                        "REPORT_CACHE_TTL_SECS={} is too large, using {}s",
                        secs,
                        MAX_CACHE_TTL.as_secs()
                    );
                    config.cache_ttl = MAX_CACHE_TTL;
                }
                Ok(secs) => config.cache_ttl = Duration::from_secs(secs),
                Err(_) => warn!(
                    "REPORT_CACHE_TTL_SECS='{}' is not a number, using {}s",
                    raw,
                    DEFAULT_TTL.as_secs()
                ),
            }
        }

        config.cache_dir = lookup("REPORT_CACHE_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        config
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
