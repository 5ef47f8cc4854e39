use std::env;
use std::path::PathBuf;

pub const ENV_BASE_URL: &str = "LEARNWEB_URL";
pub const ENV_SESSION: &str = "LEARNWEB_SESSION";
pub const ENV_DOWNLOAD_DIR: &str = "LEARNWEB_DOWNLOAD_DIR";
pub const ENV_OVERWRITE: &str = "LEARNWEB_OVERWRITE";

/// Configuration for the LearnWeb client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Course page shown in the URL field on startup.
    pub base_url: String,
    /// Value of the `MoodleSession` cookie of a logged in browser session.
    pub session_cookie: Option<String>,
    pub user_agent: String,
    /// Download root preselected instead of asking for a folder.
    pub download_dir: Option<PathBuf>,
    /// Replace existing files instead of saving `name (1).ext` next to them.
    pub overwrite_existing: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.uni-muenster.de/LearnWeb/learnweb2/".to_string(),
            session_cookie: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            download_dir: None,
            overwrite_existing: false,
        }
    }
}

impl ApiConfig {
    /// Defaults overridden by `LEARNWEB_URL`, `LEARNWEB_SESSION`,
    /// `LEARNWEB_DOWNLOAD_DIR` and `LEARNWEB_OVERWRITE` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_BASE_URL) {
            config.base_url = url;
        }
        config.session_cookie = non_empty(ENV_SESSION);
        config.download_dir = non_empty(ENV_DOWNLOAD_DIR).map(PathBuf::from);
        config.overwrite_existing = non_empty(ENV_OVERWRITE)
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        config
    }
}
