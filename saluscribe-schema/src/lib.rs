pub mod task;
pub mod token;
pub mod transcription;

pub use task::{
    RecognizeOptions, RecognizeRequest, RecognizeResult, ResultEnvelope, TaskResult, TaskStatus,
    UploadResult,
};
pub use token::TokenResponse;
pub use transcription::{
    BackendInfo, EmotionResult, PersonIdentity, SpeakerInfo, TranscriptionItem, UtteranceResult,
    WordAlignment,
};
