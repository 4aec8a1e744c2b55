use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token endpoint response.
///
/// `expires_at` is a unix timestamp in milliseconds.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_at: i64,
}

impl TokenResponse {
    /// Absolute expiry instant, or `None` when the timestamp is out of range.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
