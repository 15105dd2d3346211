//! Runner configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;

/// The deployed Adopet front-end
pub const DEFAULT_TARGET_URL: &str = "https://adopet-frontend-cypress.vercel.app/";

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Base URL used by scenarios that don't set their own
    pub target_url: String,

    /// Directory holding suite YAML files
    pub specs_dir: PathBuf,

    /// Optional YAML file of extra macros
    pub commands_file: Option<PathBuf>,

    /// Output directory for results and screenshots
    pub output_dir: PathBuf,

    /// Capture the page when a scenario fails
    pub screenshot_on_failure: bool,

    /// Browser settings
    pub playwright: PlaywrightConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            specs_dir: PathBuf::from("specs"),
            commands_file: None,
            output_dir: PathBuf::from("test-results"),
            screenshot_on_failure: true,
            playwright: PlaywrightConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> E2eResult<()> {
        let url = reqwest::Url::parse(&self.target_url).map_err(|e| E2eError::InvalidUrl {
            url: self.target_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(E2eError::InvalidUrl {
                url: self.target_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if self.playwright.action_timeout_ms == 0 || self.playwright.page_load_timeout_ms == 0 {
            return Err(E2eError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playwright::Browser;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
        assert!(config.screenshot_on_failure);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e2e.toml");
        std::fs::write(
            &path,
            r#"
target_url = "http://127.0.0.1:3000/"
screenshot_on_failure = false

[playwright]
browser = "firefox"
action_timeout_ms = 8000
"#,
        )
        .unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.target_url, "http://127.0.0.1:3000/");
        assert!(!config.screenshot_on_failure);
        assert_eq!(config.playwright.browser, Browser::Firefox);
        assert_eq!(config.playwright.action_timeout_ms, 8000);
        assert_eq!(config.playwright.page_load_timeout_ms, 60_000);
        assert_eq!(config.output_dir, PathBuf::from("test-results"));
    }

    #[test]
    fn test_rejects_non_http_target() {
        let config = RunnerConfig {
            target_url: "file:///tmp/index.html".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(E2eError::InvalidUrl { .. })));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = RunnerConfig::default();
        config.playwright.action_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }
}
