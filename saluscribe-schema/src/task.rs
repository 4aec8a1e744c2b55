use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Every REST response wraps its payload in a top-level `result` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultEnvelope<T> {
    pub result: T,
}

/// `data:upload` result.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResult {
    pub request_file_id: String,
}

/// `speech:async_recognize` result.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizeResult {
    pub id: String,
}

/// Remote task lifecycle as reported by `task:get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    New,
    Running,
    Canceled,
    Done,
    Error,
}

impl TaskStatus {
    /// Terminal statuses stop polling permanently.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Done | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Running => "RUNNING",
            Self::Canceled => "CANCELED",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `task:get` result.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskResult {
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_file_id: Option<String>,

    /// Remaining fields (`id`, `created_at`, `error`, ...) kept for diagnostics.
    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl TaskResult {
    /// Best-effort human-readable failure detail for an `ERROR` task.
    pub fn error_detail(&self) -> String {
        if let Some(error) = self.extra.get("error") {
            return match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
        if self.extra.is_empty() {
            return self.response_file_id.clone().unwrap_or_default();
        }
        serde_json::to_string(&self.extra).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecognizeOptions {
    pub model: String,
    pub audio_encoding: String,
    pub sample_rate: u32,
    pub channels_count: u32,
}

/// `speech:async_recognize` request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecognizeRequest {
    pub options: RecognizeOptions,
    pub request_file_id: String,
}

impl RecognizeRequest {
    pub const MODEL: &'static str = "general";
    pub const SAMPLE_RATE: u32 = 16_000;
    pub const CHANNELS_COUNT: u32 = 1;

    pub fn new(request_file_id: impl Into<String>, audio_encoding: impl Into<String>) -> Self {
        Self {
            options: RecognizeOptions {
                model: Self::MODEL.to_string(),
                audio_encoding: audio_encoding.into(),
                sample_rate: Self::SAMPLE_RATE,
                channels_count: Self::CHANNELS_COUNT,
            },
            request_file_id: request_file_id.into(),
        }
    }
}
