//! Configuration structures for the extraction pipeline.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InvexError, Result};

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Orchestrator configuration.
    pub extraction: ExtractionConfig,

    /// Completion service configuration.
    pub completion: CompletionConfig,
}

/// Extraction orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Model/version requested from the completion service.
    pub completion_model: String,

    /// Deadline for each collaborator call, in seconds.
    pub timeout_seconds: u64,

    /// Maximum number of documents extracted concurrently.
    pub max_parallel: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            completion_model: "gemini-1.5-flash".to_string(),
            timeout_seconds: 120,
            max_parallel: 4,
        }
    }
}

impl ExtractionConfig {
    /// Per-call deadline in seconds, never below one.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_seconds.max(1)
    }

    /// Per-call deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs())
    }

    /// Worker bound, never below one.
    pub fn parallelism(&self) -> usize {
        self.max_parallel.max(1)
    }
}

/// Completion service (Gemini API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of the generative language API.
    pub base_url: String,

    /// API key. Never written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable read when `api_key` is not set.
    pub api_key_env: String,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            temperature: Some(0.0),
        }
    }
}

impl CompletionConfig {
    /// Resolve the API key from the config or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| InvexError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InvexConfig::default();
        assert_eq!(config.extraction.completion_model, "gemini-1.5-flash");
        assert_eq!(config.extraction.timeout(), Duration::from_secs(120));
        assert_eq!(config.extraction.parallelism(), 4);
        assert_eq!(config.completion.api_key_env, "GOOGLE_API_KEY");
    }

    #[test]
    fn test_zero_bounds_are_clamped() {
        let config = ExtractionConfig {
            timeout_seconds: 0,
            max_parallel: 0,
            ..Default::default()
        };

        assert_eq!(config.timeout_secs(), 1);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.parallelism(), 1);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"extraction": {"max_parallel": 0}}"#).unwrap();
        assert_eq!(config.extraction.parallelism(), 1);
        assert_eq!(config.extraction.timeout_seconds, 120);
    }

    #[test]
    fn test_api_key_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.completion.api_key = Some("secret".to_string());
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("secret"));

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert!(loaded.completion.api_key.is_none());
        assert_eq!(loaded.extraction.max_parallel, 4);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = CompletionConfig::default();
        config.api_key_env = "INVEX_TEST_KEY_THAT_IS_NOT_SET".to_string();
        assert_eq!(config.resolve_api_key(), None);

        config.api_key = Some("abc".to_string());
        assert_eq!(config.resolve_api_key().as_deref(), Some("abc"));
    }
}
