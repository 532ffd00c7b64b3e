//! 16-bit mono RIFF/WAVE encoding

use crate::error::RenderError;
use std::io::Cursor;

/// Size of the canonical PCM header written before the sample data
pub const WAV_HEADER_LEN: usize = 44;

/// Quantize one float sample to 16-bit PCM
///
/// Negative values scale by 32768 and non-negative ones by 32767, so both
/// -1.0 and +1.0 map to the extremes without overflow. NaN encodes as 0.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    let s = (sample as f64).clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    // `as` truncates toward zero and maps NaN to 0
    scaled as i16
}

/// Encode mono samples as a little-endian 16-bit PCM WAV file in memory
pub fn encode_container(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, RenderError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(quantize_sample(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_single_positive_full_scale_sample() {
        let bytes = encode_container(&[1.0], 44100).unwrap();
        assert_eq!(bytes.len(), 46);
        assert_eq!(u32_at(&bytes, 40), 2);
        assert_eq!(&bytes[44..], &[0xFF, 0x7F]);
    }

    #[test]
    fn test_single_negative_full_scale_sample() {
        let bytes = encode_container(&[-1.0], 44100).unwrap();
        assert_eq!(&bytes[44..], &[0x00, 0x80]);
        assert_eq!(i16::from_le_bytes([bytes[44], bytes[45]]), -32768);
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_container(&[0.0; 3], 22050).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + 6);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 1);
        assert_eq!(u32_at(&bytes, 24), 22050);
        assert_eq!(u32_at(&bytes, 28), 44100);
        assert_eq!(u16_at(&bytes, 32), 2);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 6);
        assert_eq!(bytes.len(), WAV_HEADER_LEN + 6);
    }

    #[test]
    fn test_quantize_clamps_and_truncates() {
        assert_eq!(quantize_sample(2.5), 32767);
        assert_eq!(quantize_sample(-7.0), -32768);
        assert_eq!(quantize_sample(0.5), 16383);
        assert_eq!(quantize_sample(-0.5), -16384);
        assert_eq!(quantize_sample(0.0), 0);
        assert_eq!(quantize_sample(f32::NAN), 0);
    }

    #[test]
    fn test_empty_input_is_header_only() {
        let bytes = encode_container(&[], 44100).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_LEN);
        assert_eq!(u32_at(&bytes, 40), 0);
    }
}
