use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    config::EngineConfig,
    error::ConversionError,
    models::{HistoryRecord, LogEntry, SourceImage},
    pipeline::{PipelineRun, PipelineStage, RunOutcome, RunReport},
    recognizer::Recognizer,
    settings::{Settings, SettingsPatch},
};

use super::state::{ActiveRun, SessionEvent, SessionSnapshot, SessionState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const EVENT_BUFFER: usize = 64;

/// Owns everything a user interacts with: the current image and result,
/// settings, the event log, the history and at most one in-flight run.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct ConversionSession {
    state: Arc<Mutex<SessionState>>,
    recognizer: Arc<dyn Recognizer>,
    config: Arc<EngineConfig>,
    events: broadcast::Sender<SessionEvent>,
    processing: Arc<watch::Sender<bool>>,
}

impl ConversionSession {
    pub fn new(recognizer: Arc<dyn Recognizer>, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (processing, _) = watch::channel(false);

        Self {
            state: Arc::new(Mutex::new(SessionState::new(&config))),
            recognizer,
            config: Arc::new(config),
            events,
            processing: Arc::new(processing),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts converting `image` and returns the new run's id.
    ///
    /// Everything up to the recognition call happens before this returns, so
    /// an unreadable image comes back as `InvalidInput` with the run already
    /// marked failed. Recognition continues on a background task; watch
    /// [`processing`](Self::processing) or call
    /// [`wait_until_idle`](Self::wait_until_idle) to learn when it is done.
    pub async fn submit_image(&self, image: SourceImage) -> Result<String, ConversionError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(active) = &state.active {
            log_warn!(
                "rejecting {} while run {} is still {}",
                image.name,
                active.run.id,
                active.run.stage
            );
            state
                .log
                .warning(format!("Conversion already in progress, ignoring {}", image.name));
            return Err(ConversionError::ConcurrentSubmission);
        }

        let mut run = PipelineRun::new(image, state.settings.clone());
        let run_id = run.id.clone();
        log_info!(
            "run {} started for {} with {:?}",
            run_id,
            run.source.name,
            run.settings
        );
        self.set_processing(true);

        let prepared = run.prepare(&mut state.log, self.config.max_image_bytes);
        self.emit_stages(&run, 0);

        if let Err(err) = prepared {
            log_warn!("run {} rejected during ingest: {}", run_id, err);
            state.last_run = Some(run.report(RunOutcome::Failed {
                cause: err.to_string(),
            }));
            self.set_processing(false);
            return Err(err);
        }

        state.current_image = Some(run.source.clone());
        if state.current_result.take().is_some() {
            self.emit(SessionEvent::ResultChanged(None));
        }

        let cancel = CancellationToken::new();
        let image = run.source.clone();
        let settings = run.settings.clone();
        state.active = Some(ActiveRun {
            run,
            cancel: cancel.clone(),
        });
        drop(guard);

        let session = self.clone();
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            session
                .drive_recognition(task_run_id, image, settings, cancel)
                .await;
        });

        Ok(run_id)
    }

    /// Cancels any in-flight run and forgets the current image and result.
    pub async fn clear(&self) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(active) = state.active.take() {
            active.cancel.cancel();
            log_info!("run {} cancelled at {}", active.run.id, active.run.stage);
            state.log.warning("Cancelled conversion in progress");
            state.last_run = Some(active.run.report(RunOutcome::Cancelled));
            self.set_processing(false);
        }

        state.current_image = None;
        if state.current_result.take().is_some() {
            self.emit(SessionEvent::ResultChanged(None));
        }
        state.log.info("Cleared current image");
    }

    /// Shows a past conversion again without re-running the pipeline.
    ///
    /// An unknown id logs a warning and leaves the current image and result
    /// alone; the returned error is informational only.
    pub async fn select_from_history(&self, id: &str) -> Result<(), ConversionError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(record) = state.history.select(id).cloned() else {
            state.log.warning(format!("History item {id} not found"));
            return Err(ConversionError::NotFound(id.to_string()));
        };

        // Records without a thumbnail keep whatever image is on screen.
        if let Some(thumbnail) = record.thumbnail {
            state.current_image = Some(thumbnail);
        }
        state.current_result = Some(record.markup.clone());
        state.log.info("Loaded from history");
        self.emit(SessionEvent::ResultChanged(Some(record.markup)));
        Ok(())
    }

    /// Removes a history record. Exactly one info entry is written either way.
    pub async fn delete_from_history(&self, id: &str) -> Option<HistoryRecord> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match state.history.delete(id) {
            Some(record) => {
                state.log.info("Removed from history");
                self.emit(SessionEvent::HistoryChanged);
                Some(record)
            }
            None => {
                state
                    .log
                    .info(format!("History item {id} not found, nothing removed"));
                None
            }
        }
    }

    /// Merges `patch` into the settings used by future runs.
    ///
    /// A run already in flight keeps the snapshot it took at submission.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, ConversionError> {
        let mut state = self.state.lock().await;
        match state.settings.merged(&patch) {
            Ok(next) => {
                log_debug!("settings updated: {:?}", next);
                state.settings = next.clone();
                self.emit(SessionEvent::SettingsChanged(next.clone()));
                Ok(next)
            }
            Err(err) => {
                state.log.warning(format!("Settings not changed: {err}"));
                Err(err)
            }
        }
    }

    /// Current markup, for the caller to put on a clipboard.
    pub async fn copy_result(&self) -> Result<String, ConversionError> {
        self.state
            .lock()
            .await
            .current_result
            .clone()
            .ok_or(ConversionError::NoResult)
    }

    /// Markup of any history record, without selecting it.
    pub async fn copy_history(&self, id: &str) -> Result<String, ConversionError> {
        self.state
            .lock()
            .await
            .history
            .select(id)
            .map(|record| record.markup.clone())
            .ok_or_else(|| ConversionError::NotFound(id.to_string()))
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn current_image(&self) -> Option<SourceImage> {
        self.state.lock().await.current_image.clone()
    }

    pub async fn current_result(&self) -> Option<String> {
        self.state.lock().await.current_result.clone()
    }

    pub async fn active_stage(&self) -> Option<PipelineStage> {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.run.stage)
    }

    /// Settings captured by the in-flight run, if there is one.
    pub async fn active_settings(&self) -> Option<Settings> {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.run.settings.clone())
    }

    pub async fn last_run(&self) -> Option<RunReport> {
        self.state.lock().await.last_run.clone()
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.state.lock().await.log.all().to_vec()
    }

    pub async fn history(&self) -> Vec<HistoryRecord> {
        self.state.lock().await.history.list()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.state.lock().await.log.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn processing(&self) -> watch::Receiver<bool> {
        self.processing.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        *self.processing.borrow()
    }

    /// Resolves once no run is active.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.processing.subscribe();
        let _ = rx.wait_for(|processing| !*processing).await;
    }

    async fn drive_recognition(
        &self,
        run_id: String,
        image: SourceImage,
        settings: Settings,
        cancel: CancellationToken,
    ) {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_debug!("run {} cancelled while recognizing", run_id);
                return;
            }
            result = self.recognize(&image, &settings) => result,
        };

        self.finish_run(&run_id, outcome).await;
    }

    async fn recognize(&self, image: &SourceImage, settings: &Settings) -> Result<String, ConversionError> {
        let call = self.recognizer.recognize(image, settings);
        let result = match self.config.recognition_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => return Err(ConversionError::timeout()),
            },
            None => call.await,
        };
        result.map_err(|err| ConversionError::RecognitionFailure(format!("{err:#}")))
    }

    async fn finish_run(&self, run_id: &str, outcome: Result<String, ConversionError>) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let live = state
            .active
            .as_ref()
            .map(|active| active.accepts(run_id))
            .unwrap_or(false);
        if !live {
            log_debug!("discarding stale recognition response for run {}", run_id);
            return;
        }
        let Some(ActiveRun { mut run, .. }) = state.active.take() else {
            return;
        };

        let seen = run.visited().len();
        let report = match outcome.and_then(|markup| run.complete(markup, &mut state.log)) {
            Ok(record) => {
                let markup = record.markup.clone();
                state.current_result = Some(markup.clone());
                let evicted = state.history.insert(record);
                log_info!(
                    "run {} completed in {}ms ({} evicted from history)",
                    run.id,
                    run.elapsed_ms(),
                    evicted.len()
                );
                self.emit(SessionEvent::ResultChanged(Some(markup.clone())));
                self.emit(SessionEvent::HistoryChanged);
                run.report(RunOutcome::Completed { markup })
            }
            Err(err) => {
                // No-op when `complete` already failed the run.
                run.fail(&err, &mut state.log);
                log_error!("run {} failed: {}", run.id, err);
                run.report(RunOutcome::Failed {
                    cause: err.to_string(),
                })
            }
        };

        self.emit_stages(&run, seen);
        state.last_run = Some(report);
        self.set_processing(false);
    }

    fn emit_stages(&self, run: &PipelineRun, from: usize) {
        for stage in run.visited().iter().skip(from) {
            self.emit(SessionEvent::StageChanged {
                run_id: run.id.clone(),
                stage: *stage,
            });
        }
    }

    fn set_processing(&self, value: bool) {
        if self.processing.send_replace(value) != value {
            self.emit(SessionEvent::ProcessingChanged(value));
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
