//! Client and job orchestrator for the asynchronous speech recognition backend.

pub mod audio;
pub mod client;
pub mod codec;
pub mod gate;
pub mod operation;
pub mod orchestrator;
pub mod retry;
pub mod token;

pub use audio::{AudioBatch, AudioMerger, AudioPayload, ConcatMerger};
pub use client::{ResponseBody, SaluteClient};
pub use codec::AudioFormat;
pub use gate::RequestGate;
pub use operation::{Operation, SaluteEndpoints};
pub use orchestrator::{JobOutcome, SaluteSpeech};
pub use retry::RetryPolicy;
pub use token::{BearerToken, TokenManager};

/// Max characters of an upstream body kept in logs and error messages.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;
