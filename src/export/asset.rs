//! Export pipeline: downmix, offline render and WAV encoding in one call

use super::progress::RenderProgress;
use super::wav::encode_container;
use crate::audio_file::DecodedAudio;
use crate::audio_graph::OUTPUT_SAMPLE_RATE;
use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::presets::EffectPreset;
use crate::render::{downmix_to_mono, render_offline, RenderJob};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Base name used when the original file name is missing or empty
const FALLBACK_BASE_NAME: &str = "audio";

/// The result of one export
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAsset {
    /// Mono samples at [`OUTPUT_SAMPLE_RATE`]
    pub samples: Vec<f32>,
    /// The encoded WAV file
    pub bytes: Vec<u8>,
    /// Suggested download name, `<base>-<label>.wav`
    pub file_name: String,
}

impl RenderedAsset {
    pub fn sample_rate(&self) -> u32 {
        OUTPUT_SAMPLE_RATE
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / OUTPUT_SAMPLE_RATE as f64
    }

    /// Write the encoded file into `dir` under its suggested name
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        tracing::info!(path = %path.display(), bytes = self.bytes.len(), "wrote rendered asset");
        Ok(path)
    }
}

/// Remove the last `.ext` suffix, if any
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() && !name[idx + 1..].contains('/') => &name[..idx],
        _ => name,
    }
}

/// `<original name without extension>-<label>.wav`
pub fn suggested_file_name(original: Option<&str>, label: &str) -> String {
    let base = original.map(strip_extension).unwrap_or_default();
    let base = if base.is_empty() { FALLBACK_BASE_NAME } else { base };
    format!("{}-{}.wav", base, label)
}

/// Downmix, render and encode `decoded` through `preset`
pub fn export_asset(
    decoded: Arc<DecodedAudio>,
    preset: &EffectPreset,
    label: &str,
    original_name: Option<&str>,
    config: &EngineConfig,
    progress: Option<&RenderProgress>,
) -> Result<RenderedAsset, RenderError> {
    let result = render_and_encode(decoded, preset, label, original_name, config, progress);
    if let Some(p) = progress {
        match &result {
            Ok(_) => p.complete(),
            Err(e) => p.fail(&e.to_string()),
        }
    }
    result
}

fn render_and_encode(
    decoded: Arc<DecodedAudio>,
    preset: &EffectPreset,
    label: &str,
    original_name: Option<&str>,
    config: &EngineConfig,
    progress: Option<&RenderProgress>,
) -> Result<RenderedAsset, RenderError> {
    let mono = Arc::new(downmix_to_mono(&decoded, config.downmix_length));
    let job = RenderJob::export(decoded, preset.clone());
    let samples = render_offline(&job, mono, config, progress)?;
    let bytes = encode_container(&samples, OUTPUT_SAMPLE_RATE)?;
    let file_name = suggested_file_name(original_name, label);

    tracing::info!(
        file = %file_name,
        frames = samples.len(),
        duration_secs = job.output_duration(),
        bytes = bytes.len(),
        "exported asset"
    );

    Ok(RenderedAsset {
        samples,
        bytes,
        file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::WAV_HEADER_LEN;

    #[test]
    fn test_suggested_file_name() {
        assert_eq!(suggested_file_name(Some("song.mp3"), "kid"), "song-kid.wav");
        assert_eq!(suggested_file_name(Some("a.b.flac"), "cat"), "a.b-cat.wav");
        assert_eq!(suggested_file_name(Some("noext"), "slow"), "noext-slow.wav");
        assert_eq!(suggested_file_name(Some("trailing."), "slow"), "trailing.-slow.wav");
        assert_eq!(suggested_file_name(Some(".wav"), "normal"), "audio-normal.wav");
        assert_eq!(suggested_file_name(Some(""), "kid"), "audio-kid.wav");
        assert_eq!(suggested_file_name(None, "kid"), "audio-kid.wav");
    }

    #[test]
    fn test_export_asset_composes_pipeline() {
        let decoded = Arc::new(DecodedAudio::new(44100, vec![vec![0.5; 4410]; 2]).unwrap());
        let progress = RenderProgress::new();
        let asset = export_asset(
            decoded,
            &EffectPreset::normal(),
            "normal",
            Some("voice.ogg"),
            &EngineConfig::default(),
            Some(&progress),
        )
        .unwrap();

        assert_eq!(asset.file_name, "voice-normal.wav");
        assert_eq!(asset.samples.len(), 4410);
        assert_eq!(asset.bytes.len(), WAV_HEADER_LEN + 4410 * 2);
        assert!((asset.duration() - 0.1).abs() < 1e-9);
        assert_eq!(asset.sample_rate(), 44100);

        let info = progress.snapshot();
        assert!(!info.is_running);
        assert_eq!(info.percent, 100);
    }

    #[test]
    fn test_export_failure_marks_progress_failed() {
        let decoded = Arc::new(DecodedAudio::new(44100, vec![Vec::new()]).unwrap());
        let progress = RenderProgress::new();
        let err = export_asset(
            decoded,
            &EffectPreset::kid(),
            "kid",
            None,
            &EngineConfig::default(),
            Some(&progress),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::EmptyOutput));
        assert!(progress.snapshot().error.is_some());
    }

    #[test]
    fn test_write_to_creates_file() {
        let dir = std::env::temp_dir().join("audio_tool_asset_test");
        let asset = RenderedAsset {
            samples: vec![0.0],
            bytes: encode_container(&[0.0], OUTPUT_SAMPLE_RATE).unwrap(),
            file_name: "clip-slow.wav".into(),
        };
        let path = asset.write_to(&dir).unwrap();
        assert_eq!(fs::read(&path).unwrap(), asset.bytes);
        fs::remove_file(path).unwrap();
    }
}
