#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use saluscribe::config::{Credentials, SaluteConfig, SaluteResolvedConfig};
use serde_json::{Value, json};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::net::TcpListener;
use url::Url;

pub const CREDENTIALS: &str = "secret-credentials";

/// Static behaviour of the fake backend for one test.
#[derive(Debug, Clone)]
pub struct Script {
    pub token_ttl_ms: i64,
    pub token_delay: Duration,
    pub handler_delay: Duration,
    /// Status sequence served by `task:get`; the last entry repeats.
    pub statuses: Vec<&'static str>,
    /// Fixed download body. `None` echoes the audio content as a single record.
    pub download: Option<Value>,
    /// Token endpoint answers 200 with a blank `access_token`.
    pub empty_access_token: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            token_ttl_ms: 30 * 60 * 1000,
            token_delay: Duration::ZERO,
            handler_delay: Duration::ZERO,
            statuses: vec!["DONE"],
            download: None,
            empty_access_token: false,
        }
    }
}

#[derive(Default)]
pub struct Backend {
    script: Script,
    pub token_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub recognize_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub fail_next_tokens: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    issued: AtomicUsize,
    valid_tokens: Mutex<HashSet<String>>,
    statuses: Mutex<VecDeque<&'static str>>,
    pub token_headers: Mutex<Vec<HeaderMap>>,
    pub token_bodies: Mutex<Vec<String>>,
    pub upload_bodies: Mutex<Vec<(String, Vec<u8>)>>,
    pub recognize_bodies: Mutex<Vec<Value>>,
}

impl Backend {
    pub fn total_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
            + self.upload_calls.load(Ordering::SeqCst)
            + self.recognize_calls.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
            + self.download_calls.load(Ordering::SeqCst)
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Invalidates every token issued so far.
    pub fn revoke_tokens(&self) {
        self.valid_tokens.lock().unwrap().clear();
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.valid_tokens.lock().unwrap().contains(token))
    }

    fn next_status(&self) -> &'static str {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or("DONE")
        } else {
            statuses.front().copied().unwrap_or("DONE")
        }
    }
}

struct InFlight<'a>(&'a Backend);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

pub async fn spawn_backend(script: Script) -> (Arc<Backend>, Url) {
    let backend = Arc::new(Backend {
        statuses: Mutex::new(script.statuses.iter().copied().collect()),
        script,
        ..Backend::default()
    });

    let app = Router::new()
        .route("/api/v2/oauth", post(token_handler))
        .route("/rest/v1/data:upload", post(upload_handler))
        .route("/rest/v1/speech:async_recognize", post(recognize_handler))
        .route("/rest/v1/task:get", get(status_handler))
        .route("/rest/v1/data:download", get(download_handler))
        .with_state(backend.clone());

    let base = spawn_test_server(app).await;
    (backend, base)
}

pub fn make_cfg(base: &Url) -> SaluteResolvedConfig {
    let mut cfg = SaluteConfig {
        credentials: Credentials::new(CREDENTIALS),
        url_access_token: base.join("/api/v2/oauth").unwrap(),
        url_rest: base.join("/rest/v1").unwrap(),
        ..SaluteConfig::default()
    }
    .resolve();
    cfg.check_interval = Duration::from_millis(10);
    cfg
}

/// One downloadable transcription record carrying `text`.
pub fn record(text: &str) -> Value {
    json!({
        "results": [{
            "text": text,
            "normalized_text": text,
            "start": "0.120s",
            "end": "1.480s",
            "word_alignments": [{"word": text, "start": "0.120s", "end": "1.480s"}]
        }],
        "eou": true,
        "emotions_result": {"positive": 0.02, "neutral": 0.95, "negative": 0.03},
        "processed_audio_start": "0s",
        "processed_audio_end": "1.600s",
        "backend_info": {
            "model_name": "general",
            "model_version": "v1",
            "server_version": "1.0"
        },
        "channel": 0,
        "speaker_info": {"speaker_id": -1, "main_speaker_confidence": 1.0},
        "eou_reason": "ORGANIC",
        "insight": "",
        "person_identity": {
            "age": "AGE_NONE",
            "gender": "GENDER_NONE",
            "age_score": 0.0,
            "gender_score": 0.0
        }
    })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": 401, "message": "Unauthorized"})),
    )
        .into_response()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Content of the single file part in a multipart body.
fn multipart_payload(body: &[u8]) -> Option<&[u8]> {
    let start = find(body, b"\r\n\r\n")? + 4;
    let rest = &body[start..];
    let end = find(rest, b"\r\n--")?;
    Some(&rest[..end])
}

async fn token_handler(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let _guard = state.enter();
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    state.token_headers.lock().unwrap().push(headers.clone());
    state.token_bodies.lock().unwrap().push(body);

    let expected = format!("Bearer {CREDENTIALS}");
    if headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        != Some(expected.as_str())
    {
        return unauthorized();
    }

    tokio::time::sleep(state.script.token_delay).await;

    let failing = state
        .fail_next_tokens
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "token service unavailable"})),
        )
            .into_response();
    }

    if state.script.empty_access_token {
        let expires_at = chrono::Utc::now().timestamp_millis() + state.script.token_ttl_ms;
        return Json(json!({"access_token": "  ", "expires_at": expires_at})).into_response();
    }

    let n = state.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("tok-{n}");
    state.valid_tokens.lock().unwrap().insert(token.clone());

    let expires_at = chrono::Utc::now().timestamp_millis() + state.script.token_ttl_ms;
    Json(json!({"access_token": token, "expires_at": expires_at})).into_response()
}

async fn upload_handler(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _guard = state.enter();
    state.upload_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.script.handler_delay).await;

    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state
        .upload_bodies
        .lock()
        .unwrap()
        .push((content_type, body.to_vec()));

    let Some(payload) = multipart_payload(&body) else {
        return (StatusCode::BAD_REQUEST, "missing file part").into_response();
    };
    let file_id = format!("file-{}", String::from_utf8_lossy(payload));
    Json(json!({"status": 200, "result": {"request_file_id": file_id}})).into_response()
}

async fn recognize_handler(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let _guard = state.enter();
    state.recognize_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.script.handler_delay).await;

    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let file_id = body["request_file_id"].as_str().unwrap_or_default().to_string();
    state.recognize_bodies.lock().unwrap().push(body);

    let task_id = file_id.replacen("file-", "task-", 1);
    Json(json!({"status": 200, "result": {"id": task_id, "status": "NEW"}})).into_response()
}

async fn status_handler(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let _guard = state.enter();
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.script.handler_delay).await;

    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let task_id = query.get("id").cloned().unwrap_or_default();
    let response_file_id = task_id.replacen("task-", "resp-", 1);

    let result = match state.next_status() {
        "DONE" => json!({"id": task_id, "status": "DONE", "response_file_id": response_file_id}),
        "DONE_NO_FILE" => json!({"id": task_id, "status": "DONE"}),
        "ERROR" => json!({"id": task_id, "status": "ERROR", "error": "audio too short"}),
        other => json!({"id": task_id, "status": other}),
    };
    Json(json!({"status": 200, "result": result})).into_response()
}

async fn download_handler(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let _guard = state.enter();
    state.download_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.script.handler_delay).await;

    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    if let Some(body) = state.script.download.clone() {
        return Json(body).into_response();
    }

    let response_file_id = query.get("response_file_id").cloned().unwrap_or_default();
    let text = response_file_id.trim_start_matches("resp-");
    Json(json!([record(text)])).into_response()
}
