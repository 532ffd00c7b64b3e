/// Engine configuration
///
/// Settings are stored as a single JSON document. Every field has a default,
/// so an empty object (or a missing file handled by the caller) yields the
/// behavior of the original browser tool.

use crate::audio_graph::Interpolation;
use crate::render::DownmixLength;
use crate::session::SupersededResults;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ========================================================================
// CONFIG DATA
// ========================================================================

/// Tunable engine settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Source node resampling method
    pub interpolation: Interpolation,
    /// Length rule used when downmixing to mono
    pub downmix_length: DownmixLength,
    /// What to do with results of requests that a newer request replaced
    pub superseded_results: SupersededResults,
    /// Frames rendered between progress updates
    pub render_quantum_frames: usize,
    /// Longest export allowed, in output seconds
    pub max_render_seconds: f64,
    /// Frames buffered ahead of the output device during preview
    pub preview_buffer_frames: usize,
    /// Status poll interval for remote conversion jobs (milliseconds)
    pub poll_interval_ms: u64,
    /// Base URL of the remote conversion service
    pub server_url: Option<String>,
    /// Default tracing filter directive
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Linear,
            downmix_length: DownmixLength::Legacy,
            superseded_results: SupersededResults::Discard,
            render_quantum_frames: 128,
            max_render_seconds: 3600.0,
            preview_buffer_frames: 4096,
            poll_interval_ms: 1500,
            server_url: None,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Upper bound on offline output frames at `sample_rate`
    pub fn max_render_frames(&self, sample_rate: u32) -> u64 {
        (self.max_render_seconds.max(0.0) * sample_rate as f64).floor() as u64
    }
}

// ========================================================================
// CONFIG FILE OPERATIONS
// ========================================================================

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    tracing::info!(path = %path.display(), "loaded engine config");
    Ok(config)
}

/// Save configuration as pretty-printed JSON
pub fn save_config(config: &EngineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), "saved engine config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.render_quantum_frames, 128);
        assert_eq!(config.poll_interval_ms, 1500);
    }

    #[test]
    fn test_partial_override() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"interpolation":"sinc","downmix_length":"full"}"#).unwrap();
        assert_eq!(config.interpolation, Interpolation::Sinc);
        assert_eq!(config.downmix_length, DownmixLength::Full);
        assert_eq!(config.superseded_results, SupersededResults::Discard);
    }

    #[test]
    fn test_max_render_frames() {
        let config = EngineConfig {
            max_render_seconds: 2.0,
            ..EngineConfig::default()
        };
        assert_eq!(config.max_render_frames(44100), 88200);
    }

    #[test]
    fn test_save_load_config() {
        let path = env::temp_dir()
            .join("audio_tool_config_test")
            .join("engine.json");
        let _ = fs::remove_file(&path);

        let config = EngineConfig {
            superseded_results: SupersededResults::LastToComplete,
            server_url: Some("http://localhost:5000".into()),
            ..EngineConfig::default()
        };
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file_fails_with_context() {
        let path = env::temp_dir().join("audio_tool_missing_config.json");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
