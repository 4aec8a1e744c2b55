use serde::{Deserialize, Serialize};

/// Word-level time alignment. Bounds are duration strings such as `"1.240s"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WordAlignment {
    pub word: String,
    pub start: String,
    pub end: String,
}

/// One recognition hypothesis inside an utterance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UtteranceResult {
    pub text: String,
    pub normalized_text: String,
    pub start: String,
    pub end: String,
    pub word_alignments: Vec<WordAlignment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmotionResult {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendInfo {
    pub model_name: String,
    pub model_version: String,
    pub server_version: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpeakerInfo {
    pub speaker_id: i64,
    pub main_speaker_confidence: f64,
}

/// Speaker age/gender estimate. Category values (`AGE_NONE`, `GENDER_NONE`, ...) are kept as
/// strings since the backend extends them without notice.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PersonIdentity {
    pub age: String,
    pub gender: String,
    pub age_score: f64,
    pub gender_score: f64,
}

/// One per-utterance record of a downloaded transcription.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscriptionItem {
    pub results: Vec<UtteranceResult>,
    pub eou: bool,
    pub emotions_result: EmotionResult,
    pub processed_audio_start: String,
    pub processed_audio_end: String,
    pub backend_info: BackendInfo,
    pub channel: i64,
    pub speaker_info: SpeakerInfo,
    pub eou_reason: String,
    pub insight: String,
    pub person_identity: PersonIdentity,
}

impl TranscriptionItem {
    /// Recognized text of this utterance (hypotheses joined by a space).
    pub fn text(&self) -> String {
        self.results
            .iter()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
