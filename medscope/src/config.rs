use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::audience::Audience;
use crate::error::{Result, WorkspaceError};

pub const ENV_API_URL: &str = "MEDSCOPE_API_URL";
pub const ENV_AUDIENCE: &str = "MEDSCOPE_AUDIENCE";
pub const ENV_TIMEOUT_SECS: &str = "MEDSCOPE_TIMEOUT_SECS";

/// Everything the workspace needs to know about its environment.
///
/// Injected into [`crate::Workspace`] at construction; nothing in the crate
/// looks these values up globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub api_base_url: String,
    pub audience: Audience,
    pub primary_pdf_prefix: String,
    pub fallback_pdf_prefix: String,
    pub request_timeout_secs: u64,
    pub search_limit: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            audience: Audience::default(),
            primary_pdf_prefix: "/files".to_string(),
            fallback_pdf_prefix: "/uploads".to_string(),
            request_timeout_secs: 30,
            search_limit: 10,
        }
    }
}

impl WorkspaceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| WorkspaceError::Config(format!("invalid configuration: {}", e)))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WorkspaceError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `MEDSCOPE_*` environment variables on top of this configuration.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(audience) = lookup(ENV_AUDIENCE) {
            self.audience = audience.parse()?;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = timeout.trim().parse().map_err(|_| {
                WorkspaceError::Config(format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(WorkspaceError::Config(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(WorkspaceError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL for an API path such as `/upload`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_fills_missing_fields_with_defaults() {
        let config = WorkspaceConfig::from_yaml_str(
            "api_base_url: https://medscope.example.org\naudience: patient\n",
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://medscope.example.org");
        assert_eq!(config.audience, Audience::Patient);
        assert_eq!(config.primary_pdf_prefix, "/files");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_overrides_take_priority() {
        let config = WorkspaceConfig::default()
            .with_overrides(|key| match key {
                ENV_API_URL => Some("http://10.0.0.2:9000/".to_string()),
                ENV_AUDIENCE => Some("researcher".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.audience, Audience::Researcher);
        assert_eq!(config.api_url("/upload"), "http://10.0.0.2:9000/upload");
    }

    #[test]
    fn test_bad_timeout_override_is_rejected() {
        let result = WorkspaceConfig::default().with_overrides(|key| {
            (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(WorkspaceError::Config(_))));
    }

    #[test]
    fn test_validate() {
        assert!(WorkspaceConfig::default().validate().is_ok());

        let config = WorkspaceConfig {
            api_base_url: "localhost:8000".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkspaceConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
