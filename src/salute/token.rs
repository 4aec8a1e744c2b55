use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Credentials, SaluteResolvedConfig};
use crate::error::SaluteError;
use crate::salute::SaluteClient;

/// Bearer token plus its absolute expiry.
///
/// `generation` grows by one on every successful refresh so callers can tell whether the
/// token they were rejected with is still the current one.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    expiry: DateTime<Utc>,
    generation: u64,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, expiry: DateTime<Utc>, generation: u64) -> Self {
        Self {
            value: value.into(),
            expiry,
            generation,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// `Authorization` header value.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("generation", &self.generation)
            .finish()
    }
}

struct TokenInner {
    client: Arc<SaluteClient>,
    credentials: Credentials,
    scope: String,
    margin: TimeDelta,
    retry_delay: TimeDelta,
    current: watch::Sender<Option<Arc<BearerToken>>>,
    schedule: watch::Sender<Option<DateTime<Utc>>>,
    refresh_lock: Mutex<()>,
    last_generation: AtomicU64,
    timer: StdMutex<Option<JoinHandle<()>>>,
}

/// Owns the bearer token and its proactive refresh timer.
///
/// Cheap to clone. Every refresh runs under one async lock, so concurrent triggers (the timer and
/// any number of auth failures) produce at most one outstanding token request.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenInner>,
}

impl TokenManager {
    /// Spawns the refresh timer task; must be called inside a Tokio runtime.
    pub fn new(client: Arc<SaluteClient>, cfg: &SaluteResolvedConfig) -> Self {
        let (current, _) = watch::channel(None);
        let (schedule, schedule_rx) = watch::channel(None);

        let inner = Arc::new(TokenInner {
            client,
            credentials: cfg.credentials.clone(),
            scope: cfg.scope.clone(),
            margin: TimeDelta::from_std(cfg.token_refresh_margin).unwrap_or(TimeDelta::zero()),
            retry_delay: TimeDelta::from_std(cfg.token_retry_delay)
                .unwrap_or(TimeDelta::seconds(30)),
            current,
            schedule,
            refresh_lock: Mutex::new(()),
            last_generation: AtomicU64::new(0),
            timer: StdMutex::new(None),
        });

        let handle = tokio::spawn(run_refresh_timer(Arc::downgrade(&inner), schedule_rx));
        if let Ok(mut slot) = inner.timer.lock() {
            *slot = Some(handle);
        }

        Self { inner }
    }

    /// Last known token, `None` before the first successful refresh. Never blocks.
    pub fn acquire(&self) -> Option<Arc<BearerToken>> {
        self.inner.current.borrow().clone()
    }

    /// Generation of the current token, `0` before the first refresh.
    pub fn generation(&self) -> u64 {
        self.acquire().map_or(0, |t| t.generation())
    }

    /// Instant the proactive refresh timer is armed for.
    pub fn armed_refresh_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.schedule.borrow()
    }

    /// Unconditionally exchanges credentials for a fresh token.
    pub async fn refresh(&self) -> Result<Arc<BearerToken>, SaluteError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.inner.fetch_and_install("explicit").await
    }

    /// Refreshes after a 401 unless someone already replaced the rejected token.
    pub async fn refresh_after_auth_failure(
        &self,
        observed_generation: u64,
    ) -> Result<Arc<BearerToken>, SaluteError> {
        self.inner.refresh_if_stale(observed_generation, "auth_failure").await
    }

    /// Aborts the refresh timer. The current token stays readable.
    pub fn shutdown(&self) {
        self.inner.schedule.send_replace(None);
        if let Ok(mut slot) = self.inner.timer.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("generation", &self.generation())
            .field("armed_refresh_at", &self.armed_refresh_at())
            .finish_non_exhaustive()
    }
}

impl TokenInner {
    fn current_generation(&self) -> u64 {
        self.current
            .borrow()
            .as_ref()
            .map_or(0, |t| t.generation())
    }

    async fn refresh_if_stale(
        &self,
        observed_generation: u64,
        trigger: &'static str,
    ) -> Result<Arc<BearerToken>, SaluteError> {
        let _guard = self.refresh_lock.lock().await;

        if self.current_generation() != observed_generation
            && let Some(token) = self.current.borrow().clone()
        {
            debug!(
                channel = "salute",
                token.generation = token.generation(),
                observed_generation,
                trigger,
                "[Salute] Token already refreshed, skipping"
            );
            return Ok(token);
        }

        self.fetch_and_install(trigger).await
    }

    /// One token round-trip, then swap the token and re-arm the timer. Caller holds the lock.
    async fn fetch_and_install(&self, trigger: &'static str) -> Result<Arc<BearerToken>, SaluteError> {
        let resp = self
            .client
            .fetch_token(&self.credentials, &self.scope)
            .await?;

        if resp.access_token.trim().is_empty() {
            return Err(SaluteError::EmptyAccessToken);
        }
        let now = Utc::now();
        let expiry = resp
            .expiry()
            .filter(|expiry| *expiry > now)
            .ok_or(SaluteError::InvalidExpiry(resp.expires_at))?;

        let generation = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = Arc::new(BearerToken::new(resp.access_token, expiry, generation));
        self.current.send_replace(Some(token.clone()));

        let refresh_at = refresh_instant(now, expiry, self.margin, self.retry_delay);
        self.schedule.send_replace(Some(refresh_at));

        info!(
            channel = "salute",
            token.generation = generation,
            token.expiry = %expiry,
            refresh_at = %refresh_at,
            trigger,
            "[Salute] Access token refreshed, expires at {}",
            expiry
        );
        Ok(token)
    }

    async fn scheduled_refresh(&self) {
        let observed = self.current_generation();
        if let Err(e) = self.refresh_if_stale(observed, "scheduled").await {
            let retry_at = Utc::now() + self.retry_delay;
            warn!(
                channel = "salute",
                error = %e,
                retry_at = %retry_at,
                "[Salute] Scheduled token refresh failed, retrying in {}s",
                self.retry_delay.num_seconds()
            );
            self.schedule.send_replace(Some(retry_at));
        }
    }
}

/// Sleeps until the armed instant, refreshes, repeats. Any re-arm restarts the wait.
async fn run_refresh_timer(
    inner: Weak<TokenInner>,
    mut schedule: watch::Receiver<Option<DateTime<Utc>>>,
) {
    loop {
        let armed = *schedule.borrow_and_update();
        let Some(at) = armed else {
            if schedule.changed().await.is_err() {
                return;
            }
            continue;
        };

        let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            changed = schedule.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
            () = tokio::time::sleep(wait) => {}
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.scheduled_refresh().await;
    }
}

/// When the timer should fire for a token expiring at `expiry`.
///
/// Tokens too short-lived for the margin refresh halfway through, but never sooner than
/// `min(retry_delay, 1s)` from now.
fn refresh_instant(
    now: DateTime<Utc>,
    expiry: DateTime<Utc>,
    margin: TimeDelta,
    retry_delay: TimeDelta,
) -> DateTime<Utc> {
    let mut refresh_at = expiry - margin;
    if refresh_at <= now {
        refresh_at = now + (expiry - now) / 2;
    }
    let floor = now + retry_delay.min(TimeDelta::seconds(1));
    refresh_at.max(floor)
}
