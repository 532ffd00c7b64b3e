/// Offline rendering: mono downmix and faster-than-realtime graph capture
use crate::audio_file::DecodedAudio;
use crate::audio_graph::{build_graph, GraphTarget, RenderMode, OUTPUT_SAMPLE_RATE};
use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::export::RenderProgress;
use crate::presets::EffectPreset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How many samples the mono downmix holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownmixLength {
    /// `ceil(length / channels)` samples, as the browser tool produced
    #[default]
    Legacy,
    /// One sample per source frame
    Full,
}

impl DownmixLength {
    pub fn mono_length(self, frames: usize, channels: usize) -> usize {
        match self {
            DownmixLength::Legacy => frames.div_ceil(channels.max(1)),
            DownmixLength::Full => frames,
        }
    }
}

/// Average all channels into a single channel at the source rate
///
/// Channels are accumulated in index order, each sample rounded to `f32`
/// after every addition, so the result is identical on every run. Non-finite
/// samples count as silence so they never reach the filter state.
pub fn downmix_to_mono(decoded: &DecodedAudio, length: DownmixLength) -> DecodedAudio {
    let channels = decoded.number_of_channels();
    let frames = length.mono_length(decoded.length(), channels);
    let divisor = channels as f64;

    let mono: Vec<f32> = (0..frames)
        .map(|i| {
            (0..channels).fold(0.0f32, |acc, ch| {
                let sample = decoded.sample_or_silence(ch, i);
                let sample = if sample.is_finite() { sample } else { 0.0 };
                (acc as f64 + sample as f64 / divisor) as f32
            })
        })
        .collect();

    DecodedAudio::from_mono(decoded.sample_rate(), mono)
}

/// Number of 44.1 kHz frames an export of `source_duration` seconds yields
pub fn output_frame_count(source_duration: f64, pitch_factor: f64) -> u64 {
    (source_duration / pitch_factor * OUTPUT_SAMPLE_RATE as f64).ceil() as u64
}

/// One preview or export request
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub source: Arc<DecodedAudio>,
    pub preset: EffectPreset,
    pub mode: RenderMode,
}

impl RenderJob {
    pub fn export(source: Arc<DecodedAudio>, preset: EffectPreset) -> Self {
        Self {
            source,
            preset,
            mode: RenderMode::OfflineCapture,
        }
    }

    pub fn preview(source: Arc<DecodedAudio>, preset: EffectPreset) -> Self {
        Self {
            source,
            preset,
            mode: RenderMode::Realtime,
        }
    }

    /// Output length in seconds, taken from the source buffer
    pub fn output_duration(&self) -> f64 {
        self.source.duration() / self.preset.pitch_factor
    }

    pub fn output_frame_count(&self) -> u64 {
        output_frame_count(self.source.duration(), self.preset.pitch_factor)
    }
}

/// Render `mono` through the job's preset into 44.1 kHz mono samples
///
/// The frame count always comes from `job.source`, never from `mono`.
pub fn render_offline(
    job: &RenderJob,
    mono: Arc<DecodedAudio>,
    config: &EngineConfig,
    progress: Option<&RenderProgress>,
) -> Result<Vec<f32>, RenderError> {
    job.preset.validate()?;

    let frames = job.output_frame_count();
    if frames == 0 {
        return Err(RenderError::EmptyOutput);
    }
    let limit = config.max_render_frames(OUTPUT_SAMPLE_RATE);
    if frames > limit {
        return Err(RenderError::TooLong { frames, limit });
    }

    let mut graph = build_graph(
        mono,
        &job.preset,
        GraphTarget::offline_capture(),
        config.interpolation,
    )?;

    if let Some(p) = progress {
        p.start(frames, &format!("Rendering {}", job.preset.label));
    }

    let mut samples = vec![0.0f32; frames as usize];
    let quantum = config.render_quantum_frames.max(1);
    for chunk in samples.chunks_mut(quantum) {
        graph.render(chunk);
        if let Some(p) = progress {
            p.advance(chunk.len() as u64);
        }
    }
    graph.disconnect();

    tracing::debug!(
        preset = %job.preset.label,
        frames,
        duration_secs = job.output_duration(),
        "offline render finished"
    );
    Ok(samples)
}
