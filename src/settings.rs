use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

pub const MIN_CONFIDENCE: u8 = 50;
pub const MAX_CONFIDENCE: u8 = 100;
pub const CONFIDENCE_STEP: u8 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelId {
    #[default]
    MathpixV3,
    LatexOcr,
    MathmlConverter,
    CustomModel,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::MathpixV3 => "mathpix-v3",
            ModelId::LatexOcr => "latex-ocr",
            ModelId::MathmlConverter => "mathml-converter",
            ModelId::CustomModel => "custom-model",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mathpix-v3" => Some(ModelId::MathpixV3),
            "latex-ocr" => Some(ModelId::LatexOcr),
            "mathml-converter" => Some(ModelId::MathmlConverter),
            "custom-model" => Some(ModelId::CustomModel),
            _ => None,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognition parameters chosen by the user.
///
/// A run copies these at submission time; later edits only affect later runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub model: ModelId,
    pub confidence_threshold: u8,
    pub preprocessing_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: ModelId::default(),
            confidence_threshold: 85,
            preprocessing_enabled: true,
        }
    }
}

/// Partial update for [`Settings`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub model: Option<ModelId>,
    pub confidence_threshold: Option<u8>,
    pub preprocessing_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn model(model: ModelId) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    pub fn confidence_threshold(threshold: u8) -> Self {
        Self {
            confidence_threshold: Some(threshold),
            ..Self::default()
        }
    }

    pub fn preprocessing_enabled(enabled: bool) -> Self {
        Self {
            preprocessing_enabled: Some(enabled),
            ..Self::default()
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConversionError> {
        validate_confidence(self.confidence_threshold)
    }

    /// Returns the merged settings, or an error without touching `self`.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<Settings, ConversionError> {
        let mut next = self.clone();
        if let Some(model) = patch.model {
            next.model = model;
        }
        if let Some(threshold) = patch.confidence_threshold {
            validate_confidence(threshold)?;
            next.confidence_threshold = threshold;
        }
        if let Some(enabled) = patch.preprocessing_enabled {
            next.preprocessing_enabled = enabled;
        }
        Ok(next)
    }
}

fn validate_confidence(threshold: u8) -> Result<(), ConversionError> {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&threshold) {
        return Err(ConversionError::InvalidSettings(format!(
            "confidence threshold {threshold} outside {MIN_CONFIDENCE}..={MAX_CONFIDENCE}"
        )));
    }
    if threshold % CONFIDENCE_STEP != 0 {
        return Err(ConversionError::InvalidSettings(format!(
            "confidence threshold {threshold} is not a multiple of {CONFIDENCE_STEP}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_desktop_tool() {
        let settings = Settings::default();
        assert_eq!(settings.model, ModelId::MathpixV3);
        assert_eq!(settings.confidence_threshold, 85);
        assert!(settings.preprocessing_enabled);
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let base = Settings::default();
        let merged = base
            .merged(&SettingsPatch::confidence_threshold(90))
            .unwrap();
        assert_eq!(merged.confidence_threshold, 90);
        assert_eq!(merged.model, base.model);
        assert_eq!(merged.preprocessing_enabled, base.preprocessing_enabled);
    }

    #[test]
    fn rejects_threshold_off_step_or_range() {
        let base = Settings::default();
        for bad in [45, 87, 105] {
            let err = base
                .merged(&SettingsPatch::confidence_threshold(bad))
                .unwrap_err();
            assert!(matches!(err, ConversionError::InvalidSettings(_)));
        }
        assert!(base.merged(&SettingsPatch::confidence_threshold(50)).is_ok());
        assert!(base.merged(&SettingsPatch::confidence_threshold(100)).is_ok());
    }

    #[test]
    fn model_ids_round_trip_through_their_names() {
        for model in [
            ModelId::MathpixV3,
            ModelId::LatexOcr,
            ModelId::MathmlConverter,
            ModelId::CustomModel,
        ] {
            assert_eq!(ModelId::parse(model.as_str()), Some(model));
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{}\"", model.as_str()));
        }
        assert_eq!(ModelId::parse("tesseract"), None);
    }
}
