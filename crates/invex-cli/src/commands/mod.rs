//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod extract;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use invex_core::{Extractor, GeminiClient, InvexConfig, LocalTextSource};

/// Extractor wired to the local text source and the Gemini client.
pub type LocalExtractor = Extractor<LocalTextSource, GeminiClient>;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// Load the configuration from `path`, or from the default location when it
/// exists, or fall back to defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<InvexConfig> {
    if let Some(path) = path {
        return InvexConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        Ok(InvexConfig::from_file(&default_path)?)
    } else {
        Ok(InvexConfig::default())
    }
}

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(
    config: &mut InvexConfig,
    model: Option<String>,
    timeout_seconds: Option<u64>,
    jobs: Option<usize>,
) {
    if let Some(model) = model {
        config.extraction.completion_model = model;
    }
    if let Some(timeout_seconds) = timeout_seconds {
        config.extraction.timeout_seconds = timeout_seconds;
    }
    if let Some(jobs) = jobs {
        config.extraction.max_parallel = jobs;
    }
}

/// Build the extractor, failing when the completion client cannot be set up.
pub fn build_extractor(config: InvexConfig) -> anyhow::Result<LocalExtractor> {
    let client = GeminiClient::new(&config.completion, &config.extraction.completion_model)?;
    debug!(
        "Using model {} with {}s timeout",
        client.model(),
        config.extraction.timeout_seconds
    );

    Ok(Extractor::new(config.extraction, LocalTextSource::new(), client))
}
