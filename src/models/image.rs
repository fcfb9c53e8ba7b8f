use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use serde::Serialize;

/// An uploaded image held in memory.
///
/// Cloning is cheap: the bytes are shared, which is also how history
/// thumbnails point back at the image they came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceImage {
    pub name: String,
    /// MIME type declared by whoever handed us the upload, if any.
    pub mime: Option<String>,
    pub byte_len: usize,
    #[serde(skip)]
    bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            mime: None,
            byte_len: bytes.len(),
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image from {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when both values share the same underlying buffer.
    pub fn same_bytes(&self, other: &SourceImage) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}
