use crate::error::SaluteError;

/// Audio container formats the backend accepts, keyed by file extension.
///
/// Each format maps to exactly one backend codec identifier and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Ogg,
    Wav,
    Mp3,
    Flac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [
        AudioFormat::Ogg,
        AudioFormat::Wav,
        AudioFormat::Mp3,
        AudioFormat::Flac,
    ];

    pub const fn extension(self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }

    /// Backend `audio_encoding` value.
    pub const fn codec(self) -> &'static str {
        match self {
            AudioFormat::Ogg => "OPUS",
            AudioFormat::Wav => "PCM_S16LE",
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Flac => "FLAC",
        }
    }

    /// Case-insensitive; a leading dot is ignored (`".OGG"` → `Ogg`).
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(extension))
    }

    pub fn from_codec(codec: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.codec() == codec)
    }

    /// Codec for a declared format tag, or [`SaluteError::UnsupportedFormat`].
    pub fn codec_for(format: &str) -> Result<&'static str, SaluteError> {
        Self::from_extension(format)
            .map(Self::codec)
            .ok_or_else(|| SaluteError::UnsupportedFormat(format.to_string()))
    }

    pub fn all_extensions() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.extension()).collect()
    }

    pub fn all_codecs() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.codec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_exact_inverses() {
        for format in AudioFormat::ALL {
            assert_eq!(AudioFormat::from_codec(format.codec()), Some(format));
            assert_eq!(AudioFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn fixed_table_matches_backend_codecs() {
        assert_eq!(AudioFormat::codec_for("ogg").unwrap(), "OPUS");
        assert_eq!(AudioFormat::codec_for("wav").unwrap(), "PCM_S16LE");
        assert_eq!(AudioFormat::codec_for("mp3").unwrap(), "MP3");
        assert_eq!(AudioFormat::codec_for("flac").unwrap(), "FLAC");
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(AudioFormat::from_extension(".OGG"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_extension("Flac"), Some(AudioFormat::Flac));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = AudioFormat::codec_for("aac").unwrap_err();
        assert!(matches!(err, SaluteError::UnsupportedFormat(f) if f == "aac"));
        assert_eq!(AudioFormat::from_codec("opus"), None);
    }

    #[test]
    fn listings_cover_table() {
        assert_eq!(AudioFormat::all_extensions(), ["ogg", "wav", "mp3", "flac"]);
        assert_eq!(AudioFormat::all_codecs(), ["OPUS", "PCM_S16LE", "MP3", "FLAC"]);
    }
}
