use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    config::EngineConfig,
    event_log::EventLog,
    history::HistoryStore,
    models::{HistoryRecord, LogEntry, SourceImage},
    pipeline::{PipelineRun, PipelineStage, RunReport},
    settings::Settings,
};

/// Pushed to session subscribers whenever observable state changes.
///
/// Log entries have their own stream, see
/// [`ConversionSession::subscribe_logs`](super::ConversionSession::subscribe_logs).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    StageChanged {
        run_id: String,
        stage: PipelineStage,
    },
    ProcessingChanged(bool),
    ResultChanged(Option<String>),
    HistoryChanged,
    SettingsChanged(Settings),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub settings: Settings,
    pub current_image: Option<SourceImage>,
    pub current_result: Option<String>,
    pub processing: bool,
    pub stage: Option<PipelineStage>,
    pub last_run: Option<RunReport>,
    pub history: Vec<HistoryRecord>,
    pub logs: Vec<LogEntry>,
}

pub(crate) struct ActiveRun {
    pub run: PipelineRun,
    pub cancel: CancellationToken,
}

impl ActiveRun {
    /// Whether a recognition response for `run_id` may still be applied.
    pub fn accepts(&self, run_id: &str) -> bool {
        self.run.id == run_id && !self.cancel.is_cancelled()
    }
}

pub(crate) struct SessionState {
    pub settings: Settings,
    pub current_image: Option<SourceImage>,
    pub current_result: Option<String>,
    pub active: Option<ActiveRun>,
    pub last_run: Option<RunReport>,
    pub log: EventLog,
    pub history: HistoryStore,
}

impl SessionState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            settings: config.default_settings.clone(),
            current_image: None,
            current_result: None,
            active: None,
            last_run: None,
            log: EventLog::new(),
            history: HistoryStore::new(config.history_capacity),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            settings: self.settings.clone(),
            current_image: self.current_image.clone(),
            current_result: self.current_result.clone(),
            processing: self.active.is_some(),
            stage: self.active.as_ref().map(|active| active.run.stage),
            last_run: self.last_run.clone(),
            history: self.history.list(),
            logs: self.log.all().to_vec(),
        }
    }
}
