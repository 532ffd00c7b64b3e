/// Audio graph: buffer source → optional equalizer → destination
///
/// A graph is built fresh for every preview and every export and is never
/// reused once it has been disconnected.
use crate::audio_file::DecodedAudio;
use crate::effects::BiquadFilter;
use crate::error::RenderError;
use crate::presets::EffectPreset;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sample rate of the offline capture destination
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;
/// Channel count of the offline capture destination
pub const OUTPUT_CHANNELS: usize = 1;

/// Unique identifier of a built graph
pub type GraphId = u64;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// How the source node reads between source frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Two-point interpolation at read time
    #[default]
    Linear,
    /// Band-limited resampling of the whole buffer before playback
    Sinc,
}

/// Where a graph's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Paced by an output device
    Realtime,
    /// Pulled as fast as possible into a buffer
    OfflineCapture,
}

/// Destination of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphTarget {
    pub mode: RenderMode,
    pub sample_rate: u32,
    pub channels: usize,
}

impl GraphTarget {
    /// A device destination
    pub fn realtime(sample_rate: u32, channels: usize) -> Self {
        Self {
            mode: RenderMode::Realtime,
            sample_rate,
            channels,
        }
    }

    /// The fixed 44.1 kHz mono capture destination used for exports
    pub fn offline_capture() -> Self {
        Self {
            mode: RenderMode::OfflineCapture,
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
        }
    }
}

// ============================================================================
// SOURCE NODE
// ============================================================================

/// Plays a decoded buffer once from its start at a fixed playback rate
///
/// The source advances `playback_rate * source_rate / context_rate` source
/// frames per context frame, so a rate above 1 both raises pitch and shortens
/// the result. Past the end of the buffer it yields silence.
pub struct SourceNode {
    /// Frames read by this node, one `Vec` per channel
    channels: SourceData,
    /// Source frames advanced per output frame
    step: f64,
    /// Output frames produced so far
    position: u64,
}

enum SourceData {
    /// Original buffer, interpolated on the fly
    Shared(Arc<DecodedAudio>),
    /// Buffer already resampled to the context rate at the playback rate
    Resampled(Vec<Vec<f32>>),
}

impl SourceNode {
    pub fn new(
        buffer: Arc<DecodedAudio>,
        playback_rate: f64,
        context_rate: u32,
        interpolation: Interpolation,
    ) -> Result<Self, RenderError> {
        if !(playback_rate.is_finite() && playback_rate > 0.0) {
            return Err(RenderError::InvalidPitch(playback_rate));
        }
        let step = playback_rate * buffer.sample_rate() as f64 / context_rate as f64;

        match interpolation {
            Interpolation::Linear => Ok(Self {
                channels: SourceData::Shared(buffer),
                step,
                position: 0,
            }),
            Interpolation::Sinc => {
                let resampled = resample_sinc(buffer.channels(), 1.0 / step)?;
                Ok(Self {
                    channels: SourceData::Resampled(resampled),
                    step: 1.0,
                    position: 0,
                })
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        match &self.channels {
            SourceData::Shared(buffer) => buffer.number_of_channels(),
            SourceData::Resampled(channels) => channels.len(),
        }
    }

    fn frame_count(&self) -> usize {
        match &self.channels {
            SourceData::Shared(buffer) => buffer.length(),
            SourceData::Resampled(channels) => channels.first().map_or(0, Vec::len),
        }
    }

    fn read_position(&self) -> f64 {
        self.position as f64 * self.step
    }

    /// True once the read position has moved past the last source frame
    pub fn is_ended(&self) -> bool {
        self.read_position().floor() >= self.frame_count() as f64
    }

    /// Produce one output frame (one sample per source channel) and advance
    pub fn next_frame(&mut self, out: &mut [f32]) {
        let pos = self.read_position();
        let index = pos.floor();
        let frac = (pos - index) as f32;
        let index = index as usize;

        for (ch, slot) in out.iter_mut().enumerate() {
            let data: &[f32] = match &self.channels {
                SourceData::Shared(buffer) => buffer.channel(ch).unwrap_or(&[]),
                SourceData::Resampled(channels) => channels.get(ch).map(Vec::as_slice).unwrap_or(&[]),
            };
            let a = data.get(index).copied().unwrap_or(0.0);
            *slot = if frac == 0.0 {
                a
            } else {
                let b = data.get(index + 1).copied().unwrap_or(0.0);
                a + (b - a) * frac
            };
        }
        self.position += 1;
    }
}

/// Resample every channel by `ratio` (output frames per input frame)
fn resample_sinc(channels: &[Vec<f32>], ratio: f64) -> Result<Vec<Vec<f32>>, RenderError> {
    let frames = channels.first().map_or(0, Vec::len);
    if frames == 0 {
        return Ok(vec![Vec::new(); channels.len()]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, channels.len())
        .map_err(|e| RenderError::Resampler(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).ceil() as usize;

    let mut output = resampler
        .process(channels, None)
        .map_err(|e| RenderError::Resampler(e.to_string()))?;

    // Flush until the delayed tail is out
    while output.first().map_or(0, Vec::len) < delay + expected {
        let tail = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| RenderError::Resampler(e.to_string()))?;
        if tail.first().map_or(true, Vec::is_empty) {
            break;
        }
        for (ch, extra) in output.iter_mut().zip(tail) {
            ch.extend(extra);
        }
    }

    for ch in &mut output {
        ch.drain(..delay.min(ch.len()));
        ch.truncate(expected);
    }

    tracing::debug!(frames, ratio, expected, "sinc-resampled source buffer");
    Ok(output)
}

// ============================================================================
// RENDER GRAPH
// ============================================================================

/// A source, an optional equalizer per channel, and a destination
pub struct RenderGraph {
    id: GraphId,
    target: GraphTarget,
    source: SourceNode,
    /// One filter per source channel when the preset has an equalizer
    filters: Vec<BiquadFilter>,
    connected: bool,
    /// One frame of source-channel samples
    frame: Vec<f32>,
}

/// Build a one-shot graph playing `source` through `preset` into `target`
pub fn build_graph(
    source: Arc<DecodedAudio>,
    preset: &EffectPreset,
    target: GraphTarget,
    interpolation: Interpolation,
) -> Result<RenderGraph, RenderError> {
    preset.validate()?;

    let source_channels = source.number_of_channels();
    let node = SourceNode::new(source, preset.pitch_factor, target.sample_rate, interpolation)?;

    let filters = match &preset.equalizer {
        Some(eq) => (0..source_channels)
            .map(|_| BiquadFilter::new(eq, target.sample_rate))
            .collect(),
        None => Vec::new(),
    };

    let id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        graph = id,
        preset = %preset.label,
        mode = ?target.mode,
        rate = target.sample_rate,
        filtered = !filters.is_empty(),
        "built render graph"
    );

    Ok(RenderGraph {
        id,
        target,
        source: node,
        filters,
        connected: true,
        frame: vec![0.0; source_channels],
    })
}

impl RenderGraph {
    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn target(&self) -> &GraphTarget {
        &self.target
    }

    pub fn has_equalizer(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The source has played its whole buffer, or the graph was torn down
    pub fn is_ended(&self) -> bool {
        !self.connected || self.source.is_ended()
    }

    /// Tear the graph down; later renders produce silence
    pub fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            tracing::debug!(graph = self.id, "disconnected render graph");
        }
    }

    /// Fill `out` with interleaved frames at the target channel count
    ///
    /// The equalizer keeps running after the source ends, so its decay tail
    /// is part of the output.
    pub fn render(&mut self, out: &mut [f32]) {
        let out_channels = self.target.channels.max(1);
        if !self.connected {
            out.fill(0.0);
            return;
        }

        for out_frame in out.chunks_mut(out_channels) {
            self.source.next_frame(&mut self.frame);
            for (sample, filter) in self.frame.iter_mut().zip(self.filters.iter_mut()) {
                *sample = filter.process_sample(*sample);
            }
            mix_frame(&self.frame, out_frame);
        }
    }
}

/// Map one frame of source channels onto the destination channels
fn mix_frame(input: &[f32], output: &mut [f32]) {
    match (input.len(), output.len()) {
        (a, b) if a == b => output.copy_from_slice(input),
        (1, _) => output.fill(input[0]),
        (n, 1) => output[0] = input.iter().sum::<f32>() / n as f32,
        (n, _) => {
            for (ch, slot) in output.iter_mut().enumerate() {
                *slot = if ch < n { input[ch] } else { 0.0 };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EqualizerSettings, FilterType};

    fn mono(rate: u32, samples: Vec<f32>) -> Arc<DecodedAudio> {
        Arc::new(DecodedAudio::new(rate, vec![samples]).unwrap())
    }

    fn render_all(graph: &mut RenderGraph, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * graph.target().channels];
        graph.render(&mut out);
        out
    }

    #[test]
    fn test_unity_rate_same_rate_is_bit_exact() {
        let samples: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut graph = build_graph(
            mono(44100, samples.clone()),
            &EffectPreset::normal(),
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        )
        .unwrap();

        let out = render_all(&mut graph, 64);
        assert_eq!(out, samples);
        assert!(graph.is_ended());
    }

    #[test]
    fn test_double_rate_skips_every_other_frame() {
        let samples: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let preset = EffectPreset {
            label: "double".into(),
            pitch_factor: 2.0,
            equalizer: None,
        };
        let mut graph = build_graph(
            mono(100, samples),
            &preset,
            GraphTarget::realtime(100, 1),
            Interpolation::Linear,
        )
        .unwrap();

        let out = render_all(&mut graph, 6);
        assert_eq!(out, vec![0.0, 2.0, 4.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn test_half_rate_interpolates_linearly() {
        let preset = EffectPreset {
            label: "half".into(),
            pitch_factor: 0.5,
            equalizer: None,
        };
        let mut graph = build_graph(
            mono(100, vec![0.0, 1.0, 0.0]),
            &preset,
            GraphTarget::realtime(100, 1),
            Interpolation::Linear,
        )
        .unwrap();

        let out = render_all(&mut graph, 6);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_source_rate_conversion_accounts_for_context_rate() {
        // 22.05 kHz source into a 44.1 kHz context: two output frames per source frame
        let mut graph = build_graph(
            mono(22050, vec![1.0, 1.0]),
            &EffectPreset::normal(),
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        )
        .unwrap();
        let out = render_all(&mut graph, 5);
        assert_eq!(&out[..3], &[1.0, 1.0, 1.0]);
        assert!(graph.is_ended());
    }

    #[test]
    fn test_equalizer_only_present_when_preset_has_one() {
        let audio = mono(44100, vec![0.0; 16]);
        let plain = build_graph(
            audio.clone(),
            &EffectPreset::slow(),
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        )
        .unwrap();
        assert!(!plain.has_equalizer());

        let kid = build_graph(
            audio,
            &EffectPreset::kid(),
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        )
        .unwrap();
        assert!(kid.has_equalizer());
        assert_ne!(plain.id(), kid.id());
    }

    #[test]
    fn test_equalizer_matches_standalone_filter() {
        let samples: Vec<f32> = (0..256).map(|i| ((i * 7 % 13) as f32 / 13.0) - 0.5).collect();
        let mut graph = build_graph(
            mono(44100, samples.clone()),
            &EffectPreset::cat(),
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        )
        .unwrap();
        let out = render_all(&mut graph, 256);

        let eq = EqualizerSettings::new(FilterType::Highshelf, 4000.0, 6.0);
        let mut filter = BiquadFilter::new(&eq, 44100);
        let mut expected = samples;
        filter.process_block(&mut expected);
        // The cat preset also changes rate, so only frame 0 lines up exactly
        assert_eq!(out[0], expected[0]);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_equalizer_tail_continues_after_source_ends() {
        let mut graph = build_graph(
            mono(44100, vec![1.0]),
            &EffectPreset::kid(),
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        )
        .unwrap();
        let out = render_all(&mut graph, 8);
        assert!(graph.is_ended());
        assert!(out[1..].iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_stereo_source_downmixes_into_mono_target() {
        let audio = Arc::new(DecodedAudio::new(100, vec![vec![1.0; 4], vec![0.0; 4]]).unwrap());
        let mut graph = build_graph(
            audio,
            &EffectPreset::normal(),
            GraphTarget::realtime(100, 1),
            Interpolation::Linear,
        )
        .unwrap();
        assert_eq!(render_all(&mut graph, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn test_mono_source_fans_out_to_stereo_target() {
        let mut graph = build_graph(
            mono(100, vec![0.25, -0.25]),
            &EffectPreset::normal(),
            GraphTarget::realtime(100, 2),
            Interpolation::Linear,
        )
        .unwrap();
        assert_eq!(render_all(&mut graph, 2), vec![0.25, 0.25, -0.25, -0.25]);
    }

    #[test]
    fn test_disconnected_graph_renders_silence() {
        let mut graph = build_graph(
            mono(100, vec![1.0; 10]),
            &EffectPreset::normal(),
            GraphTarget::realtime(100, 1),
            Interpolation::Linear,
        )
        .unwrap();
        graph.disconnect();
        graph.disconnect();
        assert!(!graph.is_connected());
        assert!(graph.is_ended());
        assert_eq!(render_all(&mut graph, 3), vec![0.0; 3]);
    }

    #[test]
    fn test_invalid_pitch_is_rejected() {
        let preset = EffectPreset {
            label: "frozen".into(),
            pitch_factor: 0.0,
            equalizer: None,
        };
        let result = build_graph(
            mono(100, vec![0.0]),
            &preset,
            GraphTarget::offline_capture(),
            Interpolation::Linear,
        );
        assert!(matches!(result, Err(RenderError::InvalidPitch(_))));
    }

    #[test]
    fn test_sinc_resampling_preserves_duration() {
        let samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin())
            .collect();
        let node = SourceNode::new(mono(22050, samples), 1.0, 44100, Interpolation::Sinc).unwrap();
        assert_eq!(node.frame_count(), 8820);
        assert_eq!(node.channel_count(), 1);
    }

    #[test]
    fn test_interpolation_serde_names() {
        assert_eq!(serde_json::to_string(&Interpolation::Sinc).unwrap(), "\"sinc\"");
        assert_eq!(
            serde_json::from_str::<Interpolation>("\"linear\"").unwrap(),
            Interpolation::Linear
        );
    }
}
