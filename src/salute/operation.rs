use crate::error::SaluteError;
use reqwest::Method;
use url::Url;

/// Every outbound call the client can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Token,
    Upload,
    Recognize,
    Status,
    Download,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Token,
        Operation::Upload,
        Operation::Recognize,
        Operation::Status,
        Operation::Download,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Token => "token",
            Operation::Upload => "upload",
            Operation::Recognize => "recognize",
            Operation::Status => "status",
            Operation::Download => "download",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Operation::Token | Operation::Upload | Operation::Recognize => Method::POST,
            Operation::Status | Operation::Download => Method::GET,
        }
    }

    /// Path below the REST base URL. The token endpoint is a standalone URL.
    const fn rest_path(self) -> Option<&'static str> {
        match self {
            Operation::Token => None,
            Operation::Upload => Some("data:upload"),
            Operation::Recognize => Some("speech:async_recognize"),
            Operation::Status => Some("task:get"),
            Operation::Download => Some("data:download"),
        }
    }

    /// Query key carrying the operation argument, if any.
    const fn query_key(self) -> Option<&'static str> {
        match self {
            Operation::Status => Some("id"),
            Operation::Download => Some("response_file_id"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved backend URLs.
#[derive(Debug, Clone)]
pub struct SaluteEndpoints {
    token: Url,
    rest: Url,
}

impl SaluteEndpoints {
    pub fn new(token: Url, rest: Url) -> Self {
        Self { token, rest }
    }

    /// URL for `op`. `arg` fills the operation's query key (task id / response file id).
    pub fn url(&self, op: Operation, arg: Option<&str>) -> Result<Url, SaluteError> {
        let Some(path) = op.rest_path() else {
            return Ok(self.token.clone());
        };

        // `Url::join` would treat `data:upload` as a scheme, so build the string directly.
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.rest.as_str().trim_end_matches('/'),
            path
        ))?;

        if let (Some(key), Some(value)) = (op.query_key(), arg) {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }
}
