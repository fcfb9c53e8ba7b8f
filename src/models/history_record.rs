use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::SourceImage;

/// A finished conversion kept for replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub markup: String,
    pub captured_at: DateTime<Utc>,
    /// Shares the bytes of the image that produced `markup`.
    pub thumbnail: Option<SourceImage>,
}

impl HistoryRecord {
    pub fn new(markup: impl Into<String>, thumbnail: Option<SourceImage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            markup: markup.into(),
            captured_at: Utc::now(),
            thumbnail,
        }
    }
}
