//! Configuration: constants, endpoint URL builders, validation, and the
//! on-disk config file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ExporterError, Result};

/// Base URL for the LiveJournal site.
pub const BASE_URL: &str = "https://www.livejournal.com";

/// Browser user agent sent with every request.
///
/// The export endpoints sit behind the regular web frontend, which rejects
/// obviously non-browser clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per request.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Default minimum delay between requests (seconds).
pub const REQUEST_DELAY_SECS: f64 = 1.0;

/// Username of the platform's own account; a verified message from it is an
/// official announcement rather than a user message.
pub const OFFICIAL_ACCOUNT: &str = "livejournal";

/// Username pattern: lowercase letters, digits and underscores.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,25}$").expect("valid regex"));

/// Validate a LiveJournal username.
///
/// Usernames are interpolated into the profile hostname, so anything outside
/// the platform's own alphabet is rejected before a request is built.
///
/// # Examples
/// ```
/// use lj_exporter::config::validate_username;
///
/// assert!(validate_username("testuser").is_ok());
/// assert!(validate_username("bad.name").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<()> {
    if USERNAME_PATTERN.is_match(username) {
        Ok(())
    } else {
        Err(ExporterError::InvalidUsername(username.to_string()))
    }
}

/// Validate a month number (1-12).
pub fn validate_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ExporterError::InvalidMonth(month))
    }
}

/// Build the posts export URL.
pub fn posts_export_url(base_url: &str) -> String {
    format!("{base_url}/export_do.bml")
}

/// Build the comments export URL (metadata and bodies share it; the `get`
/// query parameter selects the mode).
pub fn comments_export_url(base_url: &str) -> String {
    format!("{base_url}/export_comments.bml")
}

/// Build the inbox URL.
pub fn inbox_url(base_url: &str) -> String {
    format!("{base_url}/inbox/")
}

/// Build the login URL.
pub fn login_url(base_url: &str) -> String {
    format!("{base_url}/login.bml")
}

/// Build the public profile URL for a username.
///
/// # Panics
/// Debug builds panic if the username was not validated first.
pub fn profile_url(username: &str) -> String {
    debug_assert!(
        USERNAME_PATTERN.is_match(username),
        "username should be validated before calling profile_url"
    );
    format!("https://{username}.livejournal.com/profile/")
}

/// Runtime configuration, loadable from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account username (flags override this).
    pub username: Option<String>,

    /// Account password (flags override this).
    pub password: Option<String>,

    /// Base URL of the site.
    pub base_url: String,

    /// User agent header value.
    pub user_agent: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Attempts per request before giving up.
    pub retry_attempts: u32,

    /// Minimum delay between requests in seconds.
    pub request_delay_secs: f64,

    /// Inbox folder views to download.
    pub inbox_folders: Vec<String>,

    /// Optional explicit post range; all four bounds go together.
    pub posts_start_year: Option<i32>,
    pub posts_start_month: Option<u32>,
    pub posts_end_year: Option<i32>,
    pub posts_end_month: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            base_url: BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            request_timeout_secs: HTTP_TIMEOUT_SECS,
            retry_attempts: RETRY_ATTEMPTS,
            request_delay_secs: REQUEST_DELAY_SECS,
            inbox_folders: vec!["all".to_string()],
            posts_start_year: None,
            posts_start_month: None,
            posts_end_year: None,
            posts_end_month: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    /// Save configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml_ng::to_string(self)?)?;
        Ok(())
    }

    /// Default config file location (`~/.lj-exporter/config.yaml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".lj-exporter").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("testuser").is_ok());
        assert!(validate_username("friend_1").is_ok());
        assert!(validate_username("a").is_ok());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("").is_err());
        assert!(validate_username("UpperCase").is_err());
        assert!(validate_username("dot.name").is_err());
        assert!(validate_username("name with spaces").is_err());
        assert!(validate_username("evil.example.com/").is_err());
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn test_url_builders() {
        assert_eq!(
            posts_export_url(BASE_URL),
            "https://www.livejournal.com/export_do.bml"
        );
        assert_eq!(
            comments_export_url(BASE_URL),
            "https://www.livejournal.com/export_comments.bml"
        );
        assert_eq!(inbox_url(BASE_URL), "https://www.livejournal.com/inbox/");
        assert_eq!(login_url(BASE_URL), "https://www.livejournal.com/login.bml");
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(
            profile_url("testuser"),
            "https://testuser.livejournal.com/profile/"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.inbox_folders, vec!["all".to_string()]);
        assert!(config.username.is_none());
        assert!(config.posts_start_year.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");

        let config = Config {
            username: Some("testuser".to_string()),
            request_delay_secs: 0.5,
            ..Config::default()
        };
        config.save(&path).expect("save config");

        let loaded = Config::load(&path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let loaded: Config =
            serde_yaml_ng::from_str("username: testuser\n").expect("parse partial config");
        assert_eq!(loaded.username, Some("testuser".to_string()));
        assert_eq!(loaded.base_url, BASE_URL);
        assert_eq!(loaded.retry_attempts, 3);
    }
}
