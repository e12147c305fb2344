//! TOML configuration file
//!
//! Every knob has a default, so a config file is optional and may be
//! partial. Command-line flags override whatever the file says.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::AutoCaptureConfig;
use crate::viewer::ViewerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: AutoCaptureConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "pagesnap.toml";

    /// Load configuration from `path`, or from `pagesnap.toml` in the
    /// working directory when no path is given. An explicitly passed path
    /// must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(Self::DEFAULT_PATH), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::AdvanceKey;
    use std::io::Write;

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/pagesnap.toml")));
        assert!(config.is_err());

        let config = AppConfig::default();
        assert_eq!(config.capture.max_pages, 500);
        assert_eq!(config.capture.similarity_threshold, 0.95);
        assert_eq!(config.capture.required_consecutive, 2);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[capture]
max_pages = 25
similarity_threshold = 0.9

[viewer]
advance_key = "page-down"
fullscreen = false
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.capture.max_pages, 25);
        assert_eq!(config.capture.similarity_threshold, 0.9);
        // Untouched fields come from the defaults
        assert_eq!(config.capture.required_consecutive, 2);
        assert_eq!(config.capture.page_delay_ms, 2000);
        assert_eq!(config.viewer.advance_key, AdvanceKey::PageDown);
        assert!(!config.viewer.fullscreen);
        assert!(config.viewer.close_on_exit);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[capture\nmax_pages = oops").unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());
    }
}
