use crate::error::SaluteError;
use crate::utils::logging::hex_preview;
use std::sync::Arc;

const PREVIEW_BYTES: usize = 10;

/// Audio bytes plus the declared format tag (file extension).
///
/// Immutable once constructed; cloning shares the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioPayload {
    data: Arc<[u8]>,
    format: String,
}

impl AudioPayload {
    pub fn new(data: impl Into<Arc<[u8]>>, format: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            format: format.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File name sent with the multipart upload.
    pub fn file_name(&self) -> String {
        format!("audio.{}", self.format.trim_start_matches('.'))
    }
}

impl std::fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AudioPayload(data=bytes(length={}, data={}), format='{}')",
            self.data.len(),
            hex_preview(&self.data, PREVIEW_BYTES),
            self.format
        )
    }
}

/// Several clips of the same format waiting to be merged into one payload.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioBatch {
    pub clips: Vec<Vec<u8>>,
    pub format: String,
}

impl std::fmt::Debug for AudioBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const MAX_ITEMS: usize = 3;

        let mut shown: Vec<String> = self
            .clips
            .iter()
            .take(MAX_ITEMS)
            .map(|c| format!("bytes(length={})", c.len()))
            .collect();
        if self.clips.len() > MAX_ITEMS {
            shown.push(format!("...(+{} more)", self.clips.len() - MAX_ITEMS));
        }
        write!(f, "AudioBatch(clips={shown:?}, format='{}')", self.format)
    }
}

/// Merges a batch of clips into a single uploadable payload.
///
/// Implementations may be CPU-heavy; the orchestrator runs them on the blocking pool.
pub trait AudioMerger: Send + Sync {
    fn merge(&self, batch: AudioBatch) -> Result<AudioPayload, SaluteError>;
}

/// Byte-level concatenation, valid for headerless streams (raw PCM) and single clips.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatMerger;

impl AudioMerger for ConcatMerger {
    fn merge(&self, batch: AudioBatch) -> Result<AudioPayload, SaluteError> {
        if batch.clips.is_empty() {
            return Err(SaluteError::Merge("empty batch".to_string()));
        }
        let data: Vec<u8> = batch.clips.concat();
        Ok(AudioPayload::new(data, batch.format))
    }
}
