use std::{fmt, time::Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ConversionError,
    event_log::EventLog,
    models::{HistoryRecord, SourceImage},
    settings::Settings,
};

use super::ingest::validate_image;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    Idle,
    Ingesting,
    Preprocessing,
    Analyzing,
    Recognizing,
    Completed,
    Failed,
}

impl Default for PipelineStage {
    fn default() -> Self {
        PipelineStage::Idle
    }
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Ingesting => "ingesting",
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Recognizing => "recognizing",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    /// Forward edges of the machine. `Preprocessing` is the only stage that
    /// may be skipped, and only when the run's settings disable it.
    fn permits(&self, next: PipelineStage, preprocessing_enabled: bool) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Ingesting) => true,
            (Ingesting, Preprocessing) => preprocessing_enabled,
            (Ingesting, Analyzing) => !preprocessing_enabled,
            (Preprocessing, Analyzing) => true,
            (Analyzing, Recognizing) => true,
            (Recognizing, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RunOutcome {
    Completed { markup: String },
    Failed { cause: String },
    Cancelled,
}

/// Summary of a finished run, kept by the session after the run itself is gone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub visited: Vec<PipelineStage>,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// One image moving through the conversion stages.
///
/// Every transition appends exactly one entry to the [`EventLog`] it is given,
/// before the next stage can begin.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: String,
    pub source: SourceImage,
    pub settings: Settings,
    pub stage: PipelineStage,
    pub result: Option<String>,
    pub started_at: DateTime<Utc>,
    started: Instant,
    visited: Vec<PipelineStage>,
}

impl PipelineRun {
    /// `settings` is the snapshot this run will use for its whole life.
    pub fn new(source: SourceImage, settings: Settings) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            settings,
            stage: PipelineStage::Idle,
            result: None,
            started_at: Utc::now(),
            started: Instant::now(),
            visited: Vec::new(),
        }
    }

    /// Stages entered so far, in order.
    pub fn visited(&self) -> &[PipelineStage] {
        &self.visited
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn transition(&mut self, next: PipelineStage) -> Result<(), ConversionError> {
        if !self.stage.permits(next, self.settings.preprocessing_enabled) {
            return Err(ConversionError::IllegalTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        self.visited.push(next);
        Ok(())
    }

    /// Runs every stage up to and including entering `Recognizing`.
    ///
    /// None of this suspends. On a validation failure the run is left in
    /// `Failed` (with its error entry logged) and the cause is returned.
    pub fn prepare(&mut self, log: &mut EventLog, max_image_bytes: u64) -> Result<(), ConversionError> {
        self.transition(PipelineStage::Ingesting)?;
        let info = match validate_image(&self.source, max_image_bytes) {
            Ok(info) => info,
            Err(err) => {
                self.fail(&err, log);
                return Err(err);
            }
        };
        log.info(format!(
            "Image uploaded: {} ({}x{} {}, {} bytes)",
            self.source.name,
            info.width,
            info.height,
            info.format.extensions_str().first().copied().unwrap_or("image"),
            self.source.byte_len
        ));

        if self.settings.preprocessing_enabled {
            self.transition(PipelineStage::Preprocessing)?;
            log.info("Applying image preprocessing...");
        }

        self.transition(PipelineStage::Analyzing)?;
        log.info("Analyzing mathematical structures...");

        self.transition(PipelineStage::Recognizing)?;
        log.info(format!(
            "Starting OCR with {} (confidence threshold: {}%)",
            self.settings.model, self.settings.confidence_threshold
        ));
        Ok(())
    }

    /// Accepts the recognizer's output. Empty output fails the run instead.
    pub fn complete(&mut self, markup: String, log: &mut EventLog) -> Result<HistoryRecord, ConversionError> {
        if markup.trim().is_empty() {
            let err = ConversionError::RecognitionFailure("recognizer returned no markup".into());
            self.fail(&err, log);
            return Err(err);
        }
        self.transition(PipelineStage::Completed)?;
        log.success("LaTeX extraction complete");
        self.result = Some(markup.clone());
        Ok(HistoryRecord::new(markup, Some(self.source.clone())))
    }

    /// Moves to `Failed` and logs the cause. Does nothing once terminal.
    pub fn fail(&mut self, cause: &ConversionError, log: &mut EventLog) {
        if self.transition(PipelineStage::Failed).is_ok() {
            log.error(format!("Conversion failed: {cause}"));
        }
    }

    pub fn report(&self, outcome: RunOutcome) -> RunReport {
        RunReport {
            run_id: self.id.clone(),
            visited: self.visited.clone(),
            outcome,
            started_at: self.started_at,
            elapsed_ms: self.elapsed_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Severity, pipeline::ingest::tests::png_bytes};

    fn run_with(preprocessing_enabled: bool) -> PipelineRun {
        let settings = Settings {
            preprocessing_enabled,
            ..Settings::default()
        };
        PipelineRun::new(SourceImage::new("eq.png", png_bytes(8, 8)), settings)
    }

    #[test]
    fn prepare_visits_preprocessing_when_enabled() {
        let mut log = EventLog::new();
        let mut run = run_with(true);
        run.prepare(&mut log, 1 << 20).unwrap();

        assert_eq!(
            run.visited(),
            &[
                PipelineStage::Ingesting,
                PipelineStage::Preprocessing,
                PipelineStage::Analyzing,
                PipelineStage::Recognizing,
            ]
        );
        assert_eq!(log.len(), 4);
        assert!(log.all()[0].message.starts_with("Image uploaded: eq.png (8x8"));
        assert_eq!(log.all()[1].message, "Applying image preprocessing...");
        assert!(log.all()[3].message.contains("mathpix-v3"));
        assert!(log.all()[3].message.contains("85%"));
    }

    #[test]
    fn prepare_skips_preprocessing_when_disabled() {
        let mut log = EventLog::new();
        let mut run = run_with(false);
        run.prepare(&mut log, 1 << 20).unwrap();

        assert_eq!(
            run.visited(),
            &[
                PipelineStage::Ingesting,
                PipelineStage::Analyzing,
                PipelineStage::Recognizing,
            ]
        );
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn invalid_image_fails_during_ingest() {
        let mut log = EventLog::new();
        let mut run = PipelineRun::new(
            SourceImage::new("doc.txt", b"hello".to_vec()),
            Settings::default(),
        );
        let err = run.prepare(&mut log, 1 << 20).unwrap_err();

        assert!(matches!(err, ConversionError::InvalidInput(_)));
        assert_eq!(run.stage, PipelineStage::Failed);
        assert_eq!(run.visited(), &[PipelineStage::Ingesting, PipelineStage::Failed]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.all()[0].severity, Severity::Error);
    }

    #[test]
    fn complete_produces_history_record_sharing_the_image() {
        let mut log = EventLog::new();
        let mut run = run_with(true);
        run.prepare(&mut log, 1 << 20).unwrap();
        let record = run.complete("E = mc^2".into(), &mut log).unwrap();

        assert_eq!(run.stage, PipelineStage::Completed);
        assert_eq!(run.result.as_deref(), Some("E = mc^2"));
        assert_eq!(record.markup, "E = mc^2");
        assert!(record.thumbnail.as_ref().unwrap().same_bytes(&run.source));
        assert_eq!(log.all().last().unwrap().severity, Severity::Success);
    }

    #[test]
    fn empty_markup_fails_the_run() {
        let mut log = EventLog::new();
        let mut run = run_with(false);
        run.prepare(&mut log, 1 << 20).unwrap();
        let err = run.complete("   ".into(), &mut log).unwrap_err();

        assert!(matches!(err, ConversionError::RecognitionFailure(_)));
        assert_eq!(run.stage, PipelineStage::Failed);
        assert!(run.result.is_none());
    }

    #[test]
    fn stages_cannot_be_skipped_or_reentered() {
        let mut log = EventLog::new();
        let mut run = run_with(true);
        assert!(matches!(
            run.complete("x".into(), &mut log),
            Err(ConversionError::IllegalTransition { from: PipelineStage::Idle, .. })
        ));
        assert_eq!(run.stage, PipelineStage::Idle);

        run.prepare(&mut log, 1 << 20).unwrap();
        assert!(run.prepare(&mut log, 1 << 20).is_err());
        assert_eq!(run.stage, PipelineStage::Recognizing);
    }

    #[test]
    fn fail_is_ignored_once_terminal() {
        let mut log = EventLog::new();
        let mut run = run_with(false);
        run.prepare(&mut log, 1 << 20).unwrap();
        run.complete("x".into(), &mut log).unwrap();
        let before = log.len();
        run.fail(&ConversionError::timeout(), &mut log);
        assert_eq!(run.stage, PipelineStage::Completed);
        assert_eq!(log.len(), before);
    }
}
