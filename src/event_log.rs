use tokio::sync::broadcast;

use crate::models::{LogEntry, Severity};

const SUBSCRIBER_BUFFER: usize = 256;

/// Append-only, user-facing log of what the session did.
///
/// Entries are never edited or removed. Subscribers receive every appended
/// entry in append order; a subscriber that falls more than
/// `SUBSCRIBER_BUFFER` entries behind sees `RecvError::Lagged` and can re-read
/// [`EventLog::all`].
pub struct EventLog {
    entries: Vec<LogEntry>,
    notify: broadcast::Sender<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            entries: Vec::new(),
            notify,
        }
    }

    pub fn append(&mut self, severity: Severity, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(severity, message);
        self.entries.push(entry.clone());
        // No subscribers is fine.
        let _ = self.notify.send(entry.clone());
        entry
    }

    pub fn info(&mut self, message: impl Into<String>) -> LogEntry {
        self.append(Severity::Info, message)
    }

    pub fn success(&mut self, message: impl Into<String>) -> LogEntry {
        self.append(Severity::Success, message)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> LogEntry {
        self.append(Severity::Warning, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> LogEntry {
        self.append(Severity::Error, message)
    }

    /// Oldest first.
    pub fn all(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.notify.subscribe()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
