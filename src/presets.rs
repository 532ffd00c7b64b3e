/// Effect presets: pitch/speed factor plus an optional equalizer stage
use crate::effects::{EqualizerSettings, FilterType};
use crate::error::RenderError;
use serde::{Deserialize, Serialize};

/// A named effect configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectPreset {
    pub label: String,
    /// Playback rate: 1.0 unchanged, above 1 faster and higher, below 1 slower and lower
    pub pitch_factor: f64,
    #[serde(default)]
    pub equalizer: Option<EqualizerSettings>,
}

/// Static preset definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetDef {
    pub label: &'static str,
    pub pitch_factor: f64,
    pub equalizer: Option<EqualizerSettings>,
}

pub const NORMAL: PresetDef = PresetDef {
    label: "normal",
    pitch_factor: 1.0,
    equalizer: None,
};

pub const KID: PresetDef = PresetDef {
    label: "kid",
    pitch_factor: 1.4,
    equalizer: Some(EqualizerSettings::new(FilterType::Highshelf, 3000.0, 3.0)),
};

pub const CAT: PresetDef = PresetDef {
    label: "cat",
    pitch_factor: 1.8,
    equalizer: Some(EqualizerSettings::new(FilterType::Highshelf, 4000.0, 6.0)),
};

pub const SLOW: PresetDef = PresetDef {
    label: "slow",
    pitch_factor: 0.85,
    equalizer: None,
};

/// Every built-in preset, in the order the tool lists them
pub const BUILTIN_PRESETS: [PresetDef; 4] = [NORMAL, KID, CAT, SLOW];

impl From<PresetDef> for EffectPreset {
    fn from(def: PresetDef) -> Self {
        Self {
            label: def.label.to_string(),
            pitch_factor: def.pitch_factor,
            equalizer: def.equalizer,
        }
    }
}

impl EffectPreset {
    pub fn normal() -> Self {
        NORMAL.into()
    }

    pub fn kid() -> Self {
        KID.into()
    }

    pub fn cat() -> Self {
        CAT.into()
    }

    pub fn slow() -> Self {
        SLOW.into()
    }

    /// Look up a built-in preset by label (case-insensitive)
    pub fn by_label(label: &str) -> Option<Self> {
        BUILTIN_PRESETS
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label.trim()))
            .map(|p| (*p).into())
    }

    /// Check the `pitch_factor > 0` invariant
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.pitch_factor.is_finite() && self.pitch_factor > 0.0 {
            Ok(())
        } else {
            Err(RenderError::InvalidPitch(self.pitch_factor))
        }
    }

    /// One-line description for listings
    pub fn describe(&self) -> String {
        match &self.equalizer {
            Some(eq) => format!(
                "{}: pitch x{} + {} @ {} Hz / {:+} dB",
                self.label, self.pitch_factor, eq.filter_type, eq.frequency_hz, eq.gain_db
            ),
            None => format!("{}: pitch x{}", self.label, self.pitch_factor),
        }
    }
}

/// Labels of every built-in preset
pub fn preset_labels() -> Vec<&'static str> {
    BUILTIN_PRESETS.iter().map(|p| p.label).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_values() {
        assert_eq!(EffectPreset::normal().pitch_factor, 1.0);
        assert!(EffectPreset::normal().equalizer.is_none());
        assert_eq!(EffectPreset::slow().pitch_factor, 0.85);

        let kid = EffectPreset::kid();
        assert_eq!(kid.pitch_factor, 1.4);
        let eq = kid.equalizer.unwrap();
        assert_eq!(eq.filter_type, FilterType::Highshelf);
        assert_eq!(eq.frequency_hz, 3000.0);
        assert_eq!(eq.gain_db, 3.0);

        let cat = EffectPreset::cat().equalizer.unwrap();
        assert_eq!((cat.frequency_hz, cat.gain_db), (4000.0, 6.0));
    }

    #[test]
    fn test_by_label_is_case_insensitive() {
        assert_eq!(EffectPreset::by_label("CAT"), Some(EffectPreset::cat()));
        assert_eq!(EffectPreset::by_label(" slow "), Some(EffectPreset::slow()));
        assert_eq!(EffectPreset::by_label("robot"), None);
    }

    #[test]
    fn test_every_builtin_is_valid() {
        for def in BUILTIN_PRESETS {
            assert!(EffectPreset::from(def).validate().is_ok(), "{}", def.label);
        }
        assert_eq!(preset_labels(), vec!["normal", "kid", "cat", "slow"]);
    }

    #[test]
    fn test_validate_rejects_non_positive_pitch() {
        for pitch in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let preset = EffectPreset {
                label: "bad".into(),
                pitch_factor: pitch,
                equalizer: None,
            };
            assert!(matches!(preset.validate(), Err(RenderError::InvalidPitch(_))));
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(EffectPreset::slow().describe(), "slow: pitch x0.85");
        assert_eq!(
            EffectPreset::kid().describe(),
            "kid: pitch x1.4 + highshelf @ 3000 Hz / +3 dB"
        );
    }
}
