use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use saluscribe_schema::RecognizeRequest;
use serde_json::Value;
use url::Url;

use crate::config::Credentials;
use crate::error::SaluteError;
use crate::salute::{AudioPayload, BearerToken, Operation};
use crate::utils::logging::body_preview;

/// Multipart field the backend reads the audio from.
pub const UPLOAD_FIELD: &str = "audio_file1";

/// Decoded 2xx response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// `application/json` body.
    Json(Value),
    /// Anything else, kept raw.
    Bytes(Vec<u8>),
}

/// Stateless request builders and response classification for each backend operation.
pub struct SaluteApi;

impl SaluteApi {
    pub fn build_token_request(
        http: &reqwest::Client,
        url: &Url,
        credentials: &Credentials,
        scope: &str,
    ) -> Result<reqwest::Request, reqwest::Error> {
        http.request(Operation::Token.method(), url.clone())
            .header("RqUID", uuid::Uuid::new_v4().to_string())
            .header(AUTHORIZATION, format!("Bearer {}", credentials.expose()))
            .header(ACCEPT, "application/json")
            .form(&[("scope", scope)])
            .build()
    }

    pub fn build_upload_request(
        http: &reqwest::Client,
        url: &Url,
        token: &BearerToken,
        audio: &AudioPayload,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let part = Part::bytes(audio.data().to_vec())
            .file_name(audio.file_name())
            .mime_str("application/octet-stream")?;

        http.request(Operation::Upload.method(), url.clone())
            .header(AUTHORIZATION, token.header_value())
            .header(ACCEPT, "application/json")
            .multipart(Form::new().part(UPLOAD_FIELD, part))
            .build()
    }

    pub fn build_recognize_request(
        http: &reqwest::Client,
        url: &Url,
        token: &BearerToken,
        body: &RecognizeRequest,
    ) -> Result<reqwest::Request, reqwest::Error> {
        http.request(Operation::Recognize.method(), url.clone())
            .header(AUTHORIZATION, token.header_value())
            .header(ACCEPT, "application/json")
            .json(body)
            .build()
    }

    /// Status and download are both plain authorized queries; the argument is already in `url`.
    pub fn build_get_request(
        http: &reqwest::Client,
        op: Operation,
        url: &Url,
        token: &BearerToken,
    ) -> Result<reqwest::Request, reqwest::Error> {
        http.request(op.method(), url.clone())
            .header(AUTHORIZATION, token.header_value())
            .build()
    }

    /// Sends one attempt and classifies the outcome.
    ///
    /// 401 becomes [`SaluteError::Unauthorized`], any other non-2xx becomes
    /// [`SaluteError::Upstream`]. A JSON content type that does not parse is
    /// [`SaluteError::UnexpectedPayload`].
    pub async fn execute(
        http: &reqwest::Client,
        op: Operation,
        req: reqwest::Request,
    ) -> Result<ResponseBody, SaluteError> {
        let resp = http.execute(req).await?;
        let status = resp.status();

        if !status.is_success() {
            let body = match resp.bytes().await {
                Ok(bytes) => body_preview(&bytes),
                Err(e) => format!("<failed to read body: {e}>"),
            };
            tracing::debug!(
                op = %op,
                %status,
                body = %body,
                "[Salute] Upstream returned non-success status"
            );
            if status == StatusCode::UNAUTHORIZED {
                return Err(SaluteError::Unauthorized { op, body });
            }
            return Err(SaluteError::Upstream { op, status, body });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"));
        let bytes = resp.bytes().await?;

        if !is_json {
            return Ok(ResponseBody::Bytes(bytes.to_vec()));
        }
        serde_json::from_slice(&bytes)
            .map(ResponseBody::Json)
            .map_err(|e| SaluteError::UnexpectedPayload {
                op,
                message: format!("{e}; body={}", body_preview(&bytes)),
            })
    }
}
