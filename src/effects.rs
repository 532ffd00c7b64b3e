//! Equalizer settings and the biquad filter used by effect presets
//!
//! Coefficients follow the RBJ Audio EQ Cookbook in the form browsers use for
//! their biquad node: low/high-pass take `q` in decibels, shelves use a fixed
//! shelf slope of 1, and every other type takes `q` as a plain quality factor.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Biquad response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

impl FilterType {
    pub const ALL: [FilterType; 8] = [
        FilterType::Lowpass,
        FilterType::Highpass,
        FilterType::Bandpass,
        FilterType::Lowshelf,
        FilterType::Highshelf,
        FilterType::Peaking,
        FilterType::Notch,
        FilterType::Allpass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
            FilterType::Bandpass => "bandpass",
            FilterType::Lowshelf => "lowshelf",
            FilterType::Highshelf => "highshelf",
            FilterType::Peaking => "peaking",
            FilterType::Notch => "notch",
            FilterType::Allpass => "allpass",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = String;

    /// Accepts both `highshelf` and `high-shelf` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        FilterType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown filter type: {}", s))
    }
}

/// Default quality factor of a host biquad node
pub const DEFAULT_Q: f64 = 1.0;

fn default_q() -> f64 {
    DEFAULT_Q
}

/// Equalizer stage of a preset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerSettings {
    pub filter_type: FilterType,
    pub frequency_hz: f64,
    pub gain_db: f64,
    #[serde(default = "default_q")]
    pub q: f64,
}

impl EqualizerSettings {
    pub const fn new(filter_type: FilterType, frequency_hz: f64, gain_db: f64) -> Self {
        Self {
            filter_type,
            frequency_hz,
            gain_db,
            q: DEFAULT_Q,
        }
    }
}

/// Normalized biquad coefficients (a0 divided out)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Pass-through filter
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Compute coefficients for `settings` at `sample_rate`
    pub fn design(settings: &EqualizerSettings, sample_rate: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        // Cutoff is clamped strictly inside (0, nyquist) so w0 stays well defined
        let f0 = settings.frequency_hz.clamp(1e-3, nyquist * 0.9999);
        let w0 = 2.0 * PI * f0 / sample_rate;
        let (sin_w, cos_w) = w0.sin_cos();
        let a = 10f64.powf(settings.gain_db / 40.0);
        let q = if settings.q > 0.0 { settings.q } else { DEFAULT_Q };

        let alpha_q = sin_w / (2.0 * q);
        let alpha_q_db = sin_w / (2.0 * 10f64.powf(settings.q / 20.0));
        let alpha_shelf = sin_w / 2.0 * 2f64.sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha_shelf;

        let (b0, b1, b2, a0, a1, a2) = match settings.filter_type {
            FilterType::Lowpass => (
                (1.0 - cos_w) / 2.0,
                1.0 - cos_w,
                (1.0 - cos_w) / 2.0,
                1.0 + alpha_q_db,
                -2.0 * cos_w,
                1.0 - alpha_q_db,
            ),
            FilterType::Highpass => (
                (1.0 + cos_w) / 2.0,
                -(1.0 + cos_w),
                (1.0 + cos_w) / 2.0,
                1.0 + alpha_q_db,
                -2.0 * cos_w,
                1.0 - alpha_q_db,
            ),
            FilterType::Bandpass => (
                alpha_q,
                0.0,
                -alpha_q,
                1.0 + alpha_q,
                -2.0 * cos_w,
                1.0 - alpha_q,
            ),
            FilterType::Notch => (
                1.0,
                -2.0 * cos_w,
                1.0,
                1.0 + alpha_q,
                -2.0 * cos_w,
                1.0 - alpha_q,
            ),
            FilterType::Allpass => (
                1.0 - alpha_q,
                -2.0 * cos_w,
                1.0 + alpha_q,
                1.0 + alpha_q,
                -2.0 * cos_w,
                1.0 - alpha_q,
            ),
            FilterType::Peaking => (
                1.0 + alpha_q * a,
                -2.0 * cos_w,
                1.0 - alpha_q * a,
                1.0 + alpha_q / a,
                -2.0 * cos_w,
                1.0 - alpha_q / a,
            ),
            FilterType::Lowshelf => (
                a * ((a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
                a * ((a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha),
                (a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
                (a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha,
            ),
            FilterType::Highshelf => (
                a * ((a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
                a * ((a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha),
                (a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
                (a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha,
            ),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `frequency_hz`
    pub fn magnitude_at(&self, frequency_hz: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency_hz / sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

/// Single-channel biquad, Direct Form II Transposed
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoefficients,
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    pub fn new(settings: &EqualizerSettings, sample_rate: u32) -> Self {
        Self::with_coefficients(BiquadCoefficients::design(settings, sample_rate as f64))
    }

    pub fn with_coefficients(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let x = input as f64;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y as f32
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples {
            *s = self.process_sample(*s);
        }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}
