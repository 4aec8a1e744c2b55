mod api;

pub use api::{ResponseBody, SaluteApi, UPLOAD_FIELD};

use saluscribe_schema::{
    RecognizeRequest, RecognizeResult, ResultEnvelope, TaskResult, TokenResponse,
    TranscriptionItem, UploadResult,
};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::debug;

use crate::config::{Credentials, SaluteResolvedConfig};
use crate::error::SaluteError;
use crate::salute::{
    AudioPayload, BearerToken, Operation, RequestGate, RetryPolicy, SaluteEndpoints,
};

/// HTTP transport shared by the token manager and every job.
///
/// Each attempt of each call holds one gate slot; transient transport failures are retried
/// per [`RetryPolicy`], anything else surfaces immediately.
#[derive(Debug)]
pub struct SaluteClient {
    http: reqwest::Client,
    endpoints: SaluteEndpoints,
    gate: RequestGate,
    retry: RetryPolicy,
}

impl SaluteClient {
    pub fn new(cfg: &SaluteResolvedConfig) -> Result<Self, SaluteError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("saluscribe/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.request_timeout);

        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        Ok(Self::with_parts(
            builder.build()?,
            SaluteEndpoints::new(cfg.url_access_token.clone(), cfg.url_rest.clone()),
            RequestGate::new(cfg.simultaneous_requests),
            RetryPolicy::from_config(cfg),
        ))
    }

    pub fn with_parts(
        http: reqwest::Client,
        endpoints: SaluteEndpoints,
        gate: RequestGate,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            endpoints,
            gate,
            retry,
        }
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs one logical call: gate slot per attempt, retries on transient failures.
    async fn call<F>(
        &self,
        op: Operation,
        arg: Option<&str>,
        build: F,
    ) -> Result<ResponseBody, SaluteError>
    where
        F: Fn(&reqwest::Client, &url::Url) -> Result<reqwest::Request, reqwest::Error>,
    {
        let url = self.endpoints.url(op, arg)?;
        let build = &build;
        let http = self.http.clone();
        let gate = self.gate.clone();

        let attempt = move || {
            let http = http.clone();
            let gate = gate.clone();
            let url = url.clone();
            async move {
                let _permit = gate.enter().await?;
                let start = Instant::now();
                let req = build(&http, &url)?;
                let result = SaluteApi::execute(&http, op, req).await;
                debug!(
                    channel = "salute",
                    op = %op,
                    ok = result.is_ok(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "[Salute] {} attempt finished",
                    op
                );
                result
            }
        };

        self.retry.run(op, attempt).await
    }

    pub async fn fetch_token(
        &self,
        credentials: &Credentials,
        scope: &str,
    ) -> Result<TokenResponse, SaluteError> {
        let body = self
            .call(Operation::Token, None, |http, url| {
                SaluteApi::build_token_request(http, url, credentials, scope)
            })
            .await?;
        decode(Operation::Token, body)
    }

    /// Returns the backend's `request_file_id`.
    pub async fn upload(
        &self,
        token: &BearerToken,
        audio: &AudioPayload,
    ) -> Result<String, SaluteError> {
        let body = self
            .call(Operation::Upload, None, |http, url| {
                SaluteApi::build_upload_request(http, url, token, audio)
            })
            .await?;
        let envelope: ResultEnvelope<UploadResult> = decode(Operation::Upload, body)?;
        Ok(envelope.result.request_file_id)
    }

    /// Returns the remote task id.
    pub async fn recognize(
        &self,
        token: &BearerToken,
        request_file_id: &str,
        audio_encoding: &str,
    ) -> Result<String, SaluteError> {
        let request = RecognizeRequest::new(request_file_id, audio_encoding);
        crate::utils::logging::with_pretty_json_debug(&request, |pretty| {
            debug!(channel = "salute", "[Salute] recognize body:\n{}", pretty);
        });

        let body = self
            .call(Operation::Recognize, None, |http, url| {
                SaluteApi::build_recognize_request(http, url, token, &request)
            })
            .await?;
        let envelope: ResultEnvelope<RecognizeResult> = decode(Operation::Recognize, body)?;
        Ok(envelope.result.id)
    }

    pub async fn status(
        &self,
        token: &BearerToken,
        task_id: &str,
    ) -> Result<TaskResult, SaluteError> {
        let body = self
            .call(Operation::Status, Some(task_id), |http, url| {
                SaluteApi::build_get_request(http, Operation::Status, url, token)
            })
            .await?;
        let envelope: ResultEnvelope<TaskResult> = decode(Operation::Status, body)?;
        Ok(envelope.result)
    }

    /// Fetches and parses the transcription records of a finished task.
    pub async fn download(
        &self,
        token: &BearerToken,
        response_file_id: &str,
    ) -> Result<Vec<TranscriptionItem>, SaluteError> {
        let body = self
            .call(Operation::Download, Some(response_file_id), |http, url| {
                SaluteApi::build_get_request(http, Operation::Download, url, token)
            })
            .await?;
        decode(Operation::Download, body)
    }
}

/// Deserializes a response body, tolerating JSON served without a JSON content type.
fn decode<T: DeserializeOwned>(op: Operation, body: ResponseBody) -> Result<T, SaluteError> {
    let parsed = match body {
        ResponseBody::Json(value) => serde_json::from_value(value),
        ResponseBody::Bytes(bytes) => serde_json::from_slice(&bytes),
    };
    parsed.map_err(|e| SaluteError::UnexpectedPayload {
        op,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_accepts_json_and_raw_bytes() {
        let from_json: ResultEnvelope<UploadResult> = decode(
            Operation::Upload,
            ResponseBody::Json(json!({"result": {"request_file_id": "f-1"}})),
        )
        .unwrap();
        assert_eq!(from_json.result.request_file_id, "f-1");

        let from_bytes: ResultEnvelope<RecognizeResult> = decode(
            Operation::Recognize,
            ResponseBody::Bytes(br#"{"result":{"id":"t-1"}}"#.to_vec()),
        )
        .unwrap();
        assert_eq!(from_bytes.result.id, "t-1");
    }

    #[test]
    fn decode_reports_unexpected_payload() {
        let err = decode::<Vec<TranscriptionItem>>(
            Operation::Download,
            ResponseBody::Bytes(b"not json".to_vec()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SaluteError::UnexpectedPayload {
                op: Operation::Download,
                ..
            }
        ));
    }
}
