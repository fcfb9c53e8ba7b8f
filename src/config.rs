use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{history::DEFAULT_HISTORY_CAPACITY, settings::Settings};

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Engine-wide knobs. Read once at startup, never written back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub max_image_bytes: u64,
    /// Upper bound on a single recognition call; `None` waits indefinitely.
    pub recognition_timeout_ms: Option<u64>,
    /// Artificial latency for [`SampleRecognizer`](crate::recognizer::SampleRecognizer).
    pub sample_delay_ms: u64,
    pub default_settings: Settings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            recognition_timeout_ms: None,
            sample_delay_ms: 0,
            default_settings: Settings::default(),
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `TEXSNAP_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(capacity) = env_number("TEXSNAP_HISTORY_CAPACITY")? {
            self.history_capacity = capacity as usize;
        }
        if let Some(max_bytes) = env_number("TEXSNAP_MAX_IMAGE_BYTES")? {
            self.max_image_bytes = max_bytes;
        }
        if let Some(timeout_ms) = env_number("TEXSNAP_RECOGNITION_TIMEOUT_MS")? {
            self.recognition_timeout_ms = Some(timeout_ms);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            bail!("historyCapacity must be at least 1");
        }
        if self.max_image_bytes == 0 {
            bail!("maxImageBytes must be greater than zero");
        }
        self.default_settings
            .validate()
            .context("invalid defaultSettings")?;
        Ok(())
    }

    pub fn recognition_timeout(&self) -> Option<Duration> {
        self.recognition_timeout_ms.map(Duration::from_millis)
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a non-negative integer, got '{value}'")),
        Err(_) => Ok(None),
    }
}
