pub mod history_record;
pub mod image;
pub mod log_entry;

pub use history_record::HistoryRecord;
pub use image::SourceImage;
pub use log_entry::{LogEntry, Severity};
