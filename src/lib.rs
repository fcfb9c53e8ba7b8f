pub mod config;
pub mod error;
pub mod event_log;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod recognizer;
pub mod session;
pub mod settings;
mod utils;

pub use config::EngineConfig;
pub use error::ConversionError;
pub use event_log::EventLog;
pub use history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use models::{HistoryRecord, LogEntry, Severity, SourceImage};
pub use pipeline::{PipelineRun, PipelineStage, RunOutcome, RunReport};
pub use recognizer::{Recognizer, SampleRecognizer};
pub use session::{ConversionSession, SessionEvent, SessionSnapshot};
pub use settings::{ModelId, Settings, SettingsPatch};
pub use utils::logging::init_logging;
