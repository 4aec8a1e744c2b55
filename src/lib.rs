pub mod config;
pub mod error;
pub mod salute;
pub mod utils;

pub use config::Config;
pub use error::SaluteError;
pub use saluscribe_schema::TranscriptionItem;
pub use salute::{AudioBatch, AudioFormat, AudioPayload, JobOutcome, SaluteSpeech};
