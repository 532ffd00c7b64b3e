/// Audio file decoding and the decoded sample buffer
use crate::error::DecodeError;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A decoded, immutable multi-channel buffer at its native sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    /// One sequence per channel, all of the same length
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Build a buffer from planar channel data
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidBuffer("sample rate must be positive".into()));
        }
        let Some(first) = channels.first() else {
            return Err(DecodeError::InvalidBuffer("at least one channel is required".into()));
        };
        let length = first.len();
        if let Some(idx) = channels.iter().position(|c| c.len() != length) {
            return Err(DecodeError::InvalidBuffer(format!(
                "channel {} has {} frames, expected {}",
                idx,
                channels[idx].len(),
                length
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build a buffer from interleaved frames
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        interleaved: &[f32],
    ) -> Result<Self, DecodeError> {
        if channel_count == 0 {
            return Err(DecodeError::InvalidBuffer("at least one channel is required".into()));
        }
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, sample) in frame.iter().enumerate() {
                channels[ch].push(*sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    /// Single-channel buffer derived from an already valid one
    pub(crate) fn from_mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Sample-frame count
    pub fn length(&self) -> usize {
        self.channels[0].len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Sample at a frame index, silence when out of range
    #[inline]
    pub fn sample_or_silence(&self, channel: usize, frame: usize) -> f32 {
        self.channels
            .get(channel)
            .and_then(|c| c.get(frame))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Turns raw file bytes into a [`DecodedAudio`]
///
/// Implementations must be deterministic: the same bytes always decode to the
/// same buffer or the same error, so callers never retry.
pub trait Decoder: Send + Sync {
    /// `name_hint` is the original file name, used only to guess the container.
    fn decode(&self, bytes: Vec<u8>, name_hint: Option<&str>) -> Result<DecodedAudio, DecodeError>;
}

/// Decoder backed by symphonia's default codec and format registries
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, name_hint: Option<&str>) -> Result<DecodedAudio, DecodeError> {
        let byte_len = bytes.len();
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = name_hint
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
        {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => DecodeError::Unsupported(what.to_string()),
                other => DecodeError::Malformed(other.to_string()),
            })?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| DecodeError::Unsupported("no default audio track".into()))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut buf_frames = 0usize;
        let mut interleaved = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(DecodeError::Malformed(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A single corrupt packet is skipped, the rest of the stream stays usable
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!(reason = msg, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(DecodeError::Malformed(e.to_string())),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channel_count = spec.channels.count();

            // Reallocate only when a packet outgrows the current buffer
            if sample_buf.is_none() || decoded.capacity() > buf_frames {
                buf_frames = decoded.capacity();
                sample_buf = Some(SampleBuffer::<f32>::new(buf_frames as u64, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
        }

        if channel_count == 0 || interleaved.is_empty() {
            return Err(DecodeError::NoAudio);
        }

        let audio = DecodedAudio::from_interleaved(sample_rate, channel_count, &interleaved)?;
        tracing::info!(
            bytes = byte_len,
            sample_rate = audio.sample_rate(),
            channels = audio.number_of_channels(),
            frames = audio.length(),
            duration_secs = audio.duration(),
            "decoded audio"
        );
        Ok(audio)
    }
}

/// Read and decode an audio file from disk
pub fn load_audio_file(path: &Path, decoder: &dyn Decoder) -> Result<DecodedAudio, DecodeError> {
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    decoder.decode(bytes, name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode interleaved float frames as a 16-bit PCM WAV in memory
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, interleaved: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in interleaved {
                writer.write_sample((s * 32767.0) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_new_rejects_mismatched_channel_lengths() {
        let err = DecodedAudio::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidBuffer(_)));
    }

    #[test]
    fn test_new_rejects_zero_rate_and_no_channels() {
        assert!(DecodedAudio::new(0, vec![vec![0.0]]).is_err());
        assert!(DecodedAudio::new(44100, Vec::new()).is_err());
    }

    #[test]
    fn test_from_interleaved_splits_channels() {
        let audio = DecodedAudio::from_interleaved(8000, 2, &[0.1, -0.1, 0.2, -0.2]).unwrap();
        assert_eq!(audio.number_of_channels(), 2);
        assert_eq!(audio.length(), 2);
        assert_eq!(audio.channel(0).unwrap(), &[0.1, 0.2]);
        assert_eq!(audio.channel(1).unwrap(), &[-0.1, -0.2]);
    }

    #[test]
    fn test_duration_and_out_of_range_silence() {
        let audio = DecodedAudio::new(4, vec![vec![0.5; 10]]).unwrap();
        assert!((audio.duration() - 2.5).abs() < 1e-12);
        assert_eq!(audio.sample_or_silence(0, 9), 0.5);
        assert_eq!(audio.sample_or_silence(0, 10), 0.0);
        assert_eq!(audio.sample_or_silence(3, 0), 0.0);
    }

    #[test]
    fn test_symphonia_decodes_stereo_wav() {
        let frames: Vec<f32> = (0..200).flat_map(|_| [0.5f32, -0.5f32]).collect();
        let bytes = wav_bytes(22050, 2, &frames);

        let audio = SymphoniaDecoder::new().decode(bytes, Some("clip.wav")).unwrap();
        assert_eq!(audio.sample_rate(), 22050);
        assert_eq!(audio.number_of_channels(), 2);
        assert_eq!(audio.length(), 200);
        assert!((audio.channel(0).unwrap()[10] - 0.5).abs() < 1e-3);
        assert!((audio.channel(1).unwrap()[10] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_symphonia_rejects_garbage() {
        let err = SymphoniaDecoder::new()
            .decode(b"definitely not audio".to_vec(), Some("notes.txt"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported(_) | DecodeError::Malformed(_)));
    }

    #[test]
    fn test_symphonia_rejects_empty_wav() {
        let bytes = wav_bytes(44100, 1, &[]);
        let err = SymphoniaDecoder::new().decode(bytes, Some("empty.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::NoAudio | DecodeError::Malformed(_)));
    }

    #[test]
    fn test_load_audio_file_missing_path_is_io_error() {
        let path = std::env::temp_dir().join("audio-tool-does-not-exist.wav");
        let err = load_audio_file(&path, &SymphoniaDecoder::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
