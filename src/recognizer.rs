use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::{models::SourceImage, settings::Settings};

/// The one external capability the pipeline depends on.
///
/// Called exactly once per run, from the `Recognizing` stage. Latency is
/// unbounded unless the engine is configured with a timeout.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &SourceImage, settings: &Settings) -> Result<String>;
}

pub const SAMPLE_FORMULAS: [&str; 5] = [
    "\\frac{-b \\pm \\sqrt{b^2 - 4ac}}{2a}",
    "\\int_{0}^{\\infty} e^{-x^2} dx = \\frac{\\sqrt{\\pi}}{2}",
    "\\sum_{n=1}^{\\infty} \\frac{1}{n^2} = \\frac{\\pi^2}{6}",
    "E = mc^2",
    "\\nabla \\times \\vec{E} = -\\frac{\\partial \\vec{B}}{\\partial t}",
];

/// Offline stand-in that answers with a random well-known formula.
pub struct SampleRecognizer {
    delay: Duration,
}

impl SampleRecognizer {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SampleRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Recognizer for SampleRecognizer {
    async fn recognize(&self, _image: &SourceImage, _settings: &Settings) -> Result<String> {
        // Pick before sleeping; the thread-local rng must not live across an await.
        let formula = SAMPLE_FORMULAS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(SAMPLE_FORMULAS[0]);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(formula.to_string())
    }
}
