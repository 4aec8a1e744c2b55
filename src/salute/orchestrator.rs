use futures::future::join_all;
use saluscribe_schema::{TaskResult, TaskStatus, TranscriptionItem};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SaluteResolvedConfig;
use crate::error::SaluteError;
use crate::salute::{
    AudioBatch, AudioFormat, AudioMerger, AudioPayload, BearerToken, Operation, SaluteClient,
    TokenManager,
};

/// Terminal result of one transcription job. Exactly one is produced per job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(Vec<TranscriptionItem>),
    Canceled,
    Error,
    UploadFailed,
    UnsupportedFormat,
    ParseError,
    TimedOut,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    pub fn result(&self) -> Option<&[TranscriptionItem]> {
        match self {
            JobOutcome::Completed(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<Vec<TranscriptionItem>> {
        match self {
            JobOutcome::Completed(items) => Some(items),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobOutcome::Completed(_) => "COMPLETED",
            JobOutcome::Canceled => "CANCELED",
            JobOutcome::Error => "ERROR",
            JobOutcome::UploadFailed => "UPLOAD_FAILED",
            JobOutcome::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            JobOutcome::ParseError => "PARSE_ERROR",
            JobOutcome::TimedOut => "TIMED_OUT",
        }
    }

    /// Recognized text per utterance, skipping empty ones. Empty unless completed.
    pub fn texts(&self) -> Vec<String> {
        self.result()
            .unwrap_or_default()
            .iter()
            .map(TranscriptionItem::text)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

enum JobState {
    Uploading,
    Recognizing { file_id: String },
    Polling { task_id: String },
    Downloading { response_file_id: String },
}

struct SpeechInner {
    client: Arc<SaluteClient>,
    tokens: TokenManager,
    check_interval: Duration,
    job_deadline: Option<Duration>,
    running: AtomicBool,
    next_job_id: AtomicU64,
}

/// Speech recognition handler: token lifecycle plus the per-job state machine.
///
/// Cheap to clone; clones share the token, the request gate and the running flag.
#[derive(Clone)]
pub struct SaluteSpeech {
    inner: Arc<SpeechInner>,
}

impl SaluteSpeech {
    /// Builds the HTTP client from `cfg`. Must be called inside a Tokio runtime.
    pub fn new(cfg: &SaluteResolvedConfig) -> Result<Self, SaluteError> {
        let client = SaluteClient::new(cfg)?;
        Ok(Self::with_client(Arc::new(client), cfg))
    }

    pub fn with_client(client: Arc<SaluteClient>, cfg: &SaluteResolvedConfig) -> Self {
        let tokens = TokenManager::new(client.clone(), cfg);
        Self {
            inner: Arc::new(SpeechInner {
                client,
                tokens,
                check_interval: cfg.check_interval,
                job_deadline: cfg.job_deadline,
                running: AtomicBool::new(false),
                next_job_id: AtomicU64::new(0),
            }),
        }
    }

    /// Fetches the first token and arms its refresh timer.
    pub async fn start(&self) -> Result<(), SaluteError> {
        self.inner.tokens.refresh().await?;
        self.inner.running.store(true, Ordering::SeqCst);
        info!(
            channel = "salute",
            simultaneous_requests = self.inner.client.gate().capacity(),
            "[Salute] Handler started"
        );
        Ok(())
    }

    /// Stops the refresh timer and rejects further outbound calls.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.tokens.shutdown();
        self.inner.client.gate().close();
        info!(channel = "salute", "[Salute] Handler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// Runs one job to a terminal outcome. Never returns an error.
    pub async fn transcribe(&self, audio: AudioPayload) -> JobOutcome {
        let job_id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;

        let Some(format) = AudioFormat::from_extension(audio.format()) else {
            warn!(
                channel = "salute",
                job.id = job_id,
                format = %audio.format(),
                "[Salute] [Job {}] {}",
                job_id,
                SaluteError::UnsupportedFormat(audio.format().to_string())
            );
            return JobOutcome::UnsupportedFormat;
        };

        if !self.is_running() {
            error!(
                channel = "salute",
                job.id = job_id,
                "[Salute] [Job {}] {}",
                job_id,
                SaluteError::NotStarted
            );
            return JobOutcome::Error;
        }

        debug!(
            channel = "salute",
            job.id = job_id,
            audio = ?audio,
            "[Salute] [Job {}] Accepted",
            job_id
        );

        let job = self.run_job(job_id, &audio, format);
        let outcome = match self.inner.job_deadline {
            Some(deadline) => match tokio::time::timeout(deadline, job).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        channel = "salute",
                        job.id = job_id,
                        deadline_secs = deadline.as_secs_f64(),
                        "[Salute] [Job {}] Deadline exceeded",
                        job_id
                    );
                    JobOutcome::TimedOut
                }
            },
            None => job.await,
        };

        info!(
            channel = "salute",
            job.id = job_id,
            outcome = outcome.kind(),
            "[Salute] [Job {}] Finished: {}",
            job_id,
            outcome
        );
        outcome
    }

    /// Merges `batch` on the blocking pool, then transcribes the merged payload.
    pub async fn transcribe_batch(
        &self,
        batch: AudioBatch,
        merger: Arc<dyn AudioMerger>,
    ) -> JobOutcome {
        if AudioFormat::from_extension(&batch.format).is_none() {
            warn!(
                channel = "salute",
                format = %batch.format,
                "[Salute] Batch rejected: unsupported format"
            );
            return JobOutcome::UnsupportedFormat;
        }

        let clips = batch.clips.len();
        match tokio::task::spawn_blocking(move || merger.merge(batch)).await {
            Ok(Ok(audio)) => {
                debug!(channel = "salute", clips, bytes = audio.len(), "[Salute] Batch merged");
                self.transcribe(audio).await
            }
            Ok(Err(e)) => {
                error!(channel = "salute", clips, error = %e, "[Salute] Batch merge failed");
                JobOutcome::Error
            }
            Err(e) => {
                error!(channel = "salute", clips, error = %e, "[Salute] Batch merge task failed");
                JobOutcome::Error
            }
        }
    }

    /// Runs every job concurrently; outcomes come back in input order.
    pub async fn transcribe_many<I>(&self, audios: I) -> Vec<JobOutcome>
    where
        I: IntoIterator<Item = AudioPayload>,
    {
        join_all(audios.into_iter().map(|audio| self.transcribe(audio))).await
    }

    async fn run_job(&self, job_id: u64, audio: &AudioPayload, format: AudioFormat) -> JobOutcome {
        let client = &*self.inner.client;
        let mut state = JobState::Uploading;

        loop {
            state = match state {
                JobState::Uploading => {
                    let uploaded = self
                        .authorized(Operation::Upload, move |token| async move {
                            client.upload(&token, audio).await
                        })
                        .await;
                    match uploaded {
                        Ok(file_id) => {
                            debug!(
                                channel = "salute",
                                job.id = job_id,
                                file.id = %file_id,
                                "[Salute] [Job {}] Uploaded",
                                job_id
                            );
                            JobState::Recognizing { file_id }
                        }
                        Err(e) => {
                            error!(
                                channel = "salute",
                                job.id = job_id,
                                error = %e,
                                "[Salute] [Job {}] Upload failed",
                                job_id
                            );
                            return JobOutcome::UploadFailed;
                        }
                    }
                }

                JobState::Recognizing { file_id } => {
                    let file = file_id.as_str();
                    let codec = format.codec();
                    let submitted = self
                        .authorized(Operation::Recognize, move |token| async move {
                            client.recognize(&token, file, codec).await
                        })
                        .await;
                    match submitted {
                        Ok(task_id) => {
                            info!(
                                channel = "salute",
                                job.id = job_id,
                                task.id = %task_id,
                                codec,
                                "[Salute] [Job {}] Recognition task created: {}",
                                job_id,
                                task_id
                            );
                            JobState::Polling { task_id }
                        }
                        Err(e) => return self.failed(job_id, Operation::Recognize, &e),
                    }
                }

                JobState::Polling { task_id } => {
                    tokio::time::sleep(self.inner.check_interval).await;

                    let task = match self.query_status(&task_id).await {
                        Ok(task) => task,
                        Err(e) => return self.failed(job_id, Operation::Status, &e),
                    };

                    match task.status {
                        TaskStatus::New | TaskStatus::Running => {
                            debug!(
                                channel = "salute",
                                job.id = job_id,
                                task.id = %task_id,
                                status = %task.status,
                                "[Salute] [Job {}] Task pending",
                                job_id
                            );
                            JobState::Polling { task_id }
                        }
                        TaskStatus::Canceled => {
                            info!(
                                channel = "salute",
                                job.id = job_id,
                                task.id = %task_id,
                                "[Salute] [Job {}] Task canceled by backend",
                                job_id
                            );
                            return JobOutcome::Canceled;
                        }
                        TaskStatus::Error => {
                            let detail = match self.query_status(&task_id).await {
                                Ok(task) => task.error_detail(),
                                Err(e) => format!("<status query failed: {e}>"),
                            };
                            error!(
                                channel = "salute",
                                job.id = job_id,
                                task.id = %task_id,
                                detail = %detail,
                                "[Salute] [Job {}] Task failed: {}",
                                job_id,
                                detail
                            );
                            return JobOutcome::Error;
                        }
                        TaskStatus::Done => match task.response_file_id {
                            Some(response_file_id) => JobState::Downloading { response_file_id },
                            None => {
                                error!(
                                    channel = "salute",
                                    job.id = job_id,
                                    task.id = %task_id,
                                    "[Salute] [Job {}] Task done without response_file_id",
                                    job_id
                                );
                                return JobOutcome::Error;
                            }
                        },
                    }
                }

                JobState::Downloading { response_file_id } => {
                    let response = response_file_id.as_str();
                    let downloaded = self
                        .authorized(Operation::Download, move |token| async move {
                            client.download(&token, response).await
                        })
                        .await;
                    return match downloaded {
                        Ok(items) => {
                            debug!(
                                channel = "salute",
                                job.id = job_id,
                                records = items.len(),
                                "[Salute] [Job {}] Downloaded transcription",
                                job_id
                            );
                            JobOutcome::Completed(items)
                        }
                        Err(e @ SaluteError::UnexpectedPayload { .. }) => {
                            error!(
                                channel = "salute",
                                job.id = job_id,
                                error = %e,
                                "[Salute] [Job {}] Transcription payload rejected",
                                job_id
                            );
                            JobOutcome::ParseError
                        }
                        Err(e) => self.failed(job_id, Operation::Download, &e),
                    };
                }
            };
        }
    }

    async fn query_status(&self, task_id: &str) -> Result<TaskResult, SaluteError> {
        let client = &*self.inner.client;
        self.authorized(Operation::Status, move |token| async move {
            client.status(&token, task_id).await
        })
        .await
    }

    fn failed(&self, job_id: u64, op: Operation, err: &SaluteError) -> JobOutcome {
        error!(
            channel = "salute",
            job.id = job_id,
            op = %op,
            error = %err,
            "[Salute] [Job {}] {} failed",
            job_id,
            op
        );
        JobOutcome::Error
    }

    /// Runs `call` with the current token; on a 401 refreshes once and retries once.
    async fn authorized<T, F, Fut>(&self, op: Operation, call: F) -> Result<T, SaluteError>
    where
        F: Fn(Arc<BearerToken>) -> Fut,
        Fut: Future<Output = Result<T, SaluteError>>,
    {
        let tokens = &self.inner.tokens;
        let token = match tokens.acquire() {
            Some(token) => token,
            None => tokens.refresh_after_auth_failure(0).await?,
        };
        let observed = token.generation();

        match call(token).await {
            Err(e) if e.is_auth() => {
                warn!(
                    channel = "salute",
                    op = %op,
                    token.generation = observed,
                    "[Salute] {} rejected the token, refreshing",
                    op
                );
                let fresh = tokens.refresh_after_auth_failure(observed).await?;
                call(fresh).await
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for SaluteSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaluteSpeech")
            .field("running", &self.is_running())
            .field("check_interval", &self.inner.check_interval)
            .field("job_deadline", &self.inner.job_deadline)
            .finish_non_exhaustive()
    }
}
