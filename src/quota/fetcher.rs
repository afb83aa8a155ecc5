// Quota-rotating fetcher: run one operation across a pool of API keys.
//
// Credentials are tried strictly in order, one at a time. Parallel attempts
// would burn quota on every key for a request one key could have served.
//
//   Success         -> return it, stop
//   QuotaExceeded   -> record, next key
//   RetryableError  -> record, next key
//   FatalError      -> FatalPolicy decides: abort now, or record and go on
//
// Running out of keys yields AllCredentialsExhausted, which carries every
// per-key failure for logging but renders as a single message callers can
// pass straight through.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::attempt::{AttemptResult, FatalError, FatalPolicy, OnFatal};
use super::credential::Credential;
use super::pagination::{collect_pages, Page};

/// Why a single credential didn't produce a result.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    QuotaExceeded,
    Retryable(String),
    Fatal(FatalError),
}

/// A per-credential diagnostic kept on the exhausted error.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialFailure {
    /// Masked credential, safe to log.
    pub credential: String,
    pub reason: FailureReason,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("All API keys exhausted or error occurred")]
    AllCredentialsExhausted { failures: Vec<CredentialFailure> },

    #[error("Request failed with key {credential}: {error}")]
    Aborted {
        credential: String,
        error: FatalError,
    },

    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    /// The per-credential failures, empty unless the pool was exhausted.
    pub fn failures(&self) -> &[CredentialFailure] {
        match self {
            FetchError::AllCredentialsExhausted { failures } => failures,
            _ => &[],
        }
    }
}

/// Stateless rotation driver. Cheap to clone and share between handlers.
#[derive(Debug, Clone, Default)]
pub struct QuotaRotatingFetcher {
    policy: FatalPolicy,
}

impl QuotaRotatingFetcher {
    pub fn new(policy: FatalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FatalPolicy {
        &self.policy
    }

    /// Try `attempt` with each credential in order until one succeeds.
    ///
    /// Callers pass only eligible (active) credentials; see
    /// [`super::credential::active_only`].
    pub async fn fetch<T, F, Fut>(&self, credentials: &[Credential], attempt: F) -> Result<T, FetchError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        self.fetch_cancellable(credentials, &CancellationToken::new(), attempt)
            .await
    }

    /// Like [`fetch`](Self::fetch), but stops as soon as `cancel` fires.
    ///
    /// Cancellation drops the in-flight attempt and returns `Cancelled`
    /// without touching the remaining credentials.
    pub async fn fetch_cancellable<T, F, Fut>(
        &self,
        credentials: &[Credential],
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        if credentials.is_empty() {
            warn!("No API credentials available");
            return Err(FetchError::AllCredentialsExhausted {
                failures: Vec::new(),
            });
        }

        let mut failures = Vec::new();

        for (position, credential) in credentials.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(position, "Fetch cancelled before trying next credential");
                return Err(FetchError::Cancelled);
            }

            let masked = credential.masked();
            debug!(credential = %masked, position, "Trying credential");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(credential = %masked, position, "Fetch cancelled mid-attempt");
                    return Err(FetchError::Cancelled);
                }
                result = attempt(credential.clone()) => result,
            };

            let reason = match result {
                AttemptResult::Success(value) => {
                    debug!(credential = %masked, position, "Credential succeeded");
                    return Ok(value);
                }
                AttemptResult::QuotaExceeded => {
                    warn!(credential = %masked, position, "Quota exceeded, rotating to next key");
                    FailureReason::QuotaExceeded
                }
                AttemptResult::RetryableError(detail) => {
                    warn!(
                        credential = %masked,
                        position,
                        error = %detail,
                        "Attempt failed, rotating to next key"
                    );
                    FailureReason::Retryable(detail)
                }
                AttemptResult::FatalError(err) => match self.policy.action_for(err.class) {
                    OnFatal::Abort => {
                        error!(credential = %masked, position, error = %err, "Fatal error, giving up");
                        return Err(FetchError::Aborted {
                            credential: masked,
                            error: err,
                        });
                    }
                    OnFatal::Continue => {
                        warn!(
                            credential = %masked,
                            position,
                            error = %err,
                            "Fatal error, rotating to next key per policy"
                        );
                        FailureReason::Fatal(err)
                    }
                },
            };

            failures.push(CredentialFailure {
                credential: masked,
                reason,
            });
        }

        error!(
            tried = failures.len(),
            "All API keys exhausted or error occurred"
        );
        Err(FetchError::AllCredentialsExhausted { failures })
    }

    /// Paginated variant: each attempt walks every page under one credential.
    ///
    /// `fetch_page` receives the credential and the cursor (None for the
    /// first page). Rotation only happens when a whole attempt fails.
    pub async fn fetch_paginated<T, F, Fut>(
        &self,
        credentials: &[Credential],
        cancel: &CancellationToken,
        max_items: Option<usize>,
        fetch_page: F,
    ) -> Result<Vec<T>, FetchError>
    where
        F: Fn(Credential, Option<String>) -> Fut,
        Fut: Future<Output = AttemptResult<Page<T>>>,
    {
        let fetch_page = &fetch_page;
        self.fetch_cancellable(credentials, cancel, |credential| async move {
            collect_pages(max_items, |cursor| fetch_page(credential.clone(), cursor)).await
        })
        .await
    }
}

/// A cancellation token that fires after a timeout.
///
/// The timer task lives only as long as the `Deadline`: dropping it aborts
/// the timer, so a request that finishes early leaves nothing running.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl Deadline {
    /// Cancel the token once `timeout` has elapsed.
    pub fn after(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let timer = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timer.cancel();
        });
        Self {
            token,
            timer: Some(handle),
        }
    }

    /// A token that never fires on its own.
    pub fn none() -> Self {
        Self {
            token: CancellationToken::new(),
            timer: None,
        }
    }

    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::none, Self::after)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::attempt::FatalClass;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn keys(tokens: &[&str]) -> Vec<Credential> {
        tokens.iter().map(|t| Credential::new(*t)).collect()
    }

    // ── Success and ordering ────────────────────────────────────────

    #[tokio::test]
    async fn test_first_success_wins_without_trying_rest() {
        let fetcher = QuotaRotatingFetcher::default();
        let seen = Mutex::new(Vec::new());

        let result = fetcher
            .fetch(&keys(&["key-aaaa", "key-bbbb", "key-cccc"]), |c| {
                seen.lock().unwrap().push(c.token().to_string());
                async { AttemptResult::Success(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(*seen.lock().unwrap(), vec!["key-aaaa"]);
    }

    #[tokio::test]
    async fn test_nth_success_after_quota_errors_calls_in_order() {
        let fetcher = QuotaRotatingFetcher::default();

        for n in 1..=4usize {
            let tokens: Vec<String> = (0..4).map(|i| format!("key-{i:04}")).collect();
            let creds: Vec<Credential> = tokens.iter().map(Credential::new).collect();
            let seen = Mutex::new(Vec::new());

            let result = fetcher
                .fetch(&creds, |c| {
                    let mut seen = seen.lock().unwrap();
                    seen.push(c.token().to_string());
                    let call = seen.len();
                    async move {
                        if call == n {
                            AttemptResult::Success(call)
                        } else {
                            AttemptResult::QuotaExceeded
                        }
                    }
                })
                .await;

            assert_eq!(result.unwrap(), n);
            assert_eq!(*seen.lock().unwrap(), tokens[..n].to_vec());
        }
    }

    #[tokio::test]
    async fn test_retryable_error_moves_on() {
        let fetcher = QuotaRotatingFetcher::default();
        let calls = AtomicU32::new(0);

        let result = fetcher
            .fetch(&keys(&["first-key", "second-key"]), |_| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        AttemptResult::RetryableError("HTTP 503".to_string())
                    } else {
                        AttemptResult::Success("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // ── Exhaustion ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_list_is_exhausted_without_calls() {
        let fetcher = QuotaRotatingFetcher::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = fetcher
            .fetch(&[], |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { AttemptResult::Success(()) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, FetchError::AllCredentialsExhausted { .. }));
        assert!(err.failures().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failing_is_exhausted_after_len_calls() {
        let fetcher = QuotaRotatingFetcher::default();
        let calls = AtomicU32::new(0);

        let result: Result<u8, _> = fetcher
            .fetch(&keys(&["key-0001", "key-0002", "key-0003"]), |_| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call % 2 == 0 {
                        AttemptResult::QuotaExceeded
                    } else {
                        AttemptResult::RetryableError("timeout".to_string())
                    }
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.to_string(), "All API keys exhausted or error occurred");

        let failures = err.failures();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].credential, "…0001");
        assert_eq!(failures[0].reason, FailureReason::QuotaExceeded);
        assert_eq!(
            failures[1].reason,
            FailureReason::Retryable("timeout".to_string())
        );
    }

    // ── Fatal policy ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_fatal_error_continues_by_default() {
        let fetcher = QuotaRotatingFetcher::default();
        let calls = AtomicU32::new(0);

        let result = fetcher
            .fetch(&keys(&["key-0001", "key-0002"]), |_| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        AttemptResult::FatalError(FatalError::new(FatalClass::Decode, "bad body"))
                    } else {
                        AttemptResult::Success(1)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_when_policy_says_so() {
        let policy = FatalPolicy::default().with_override(FatalClass::NotFound, OnFatal::Abort);
        let fetcher = QuotaRotatingFetcher::new(policy);
        let calls = AtomicU32::new(0);

        let result: Result<u8, _> = fetcher
            .fetch(&keys(&["key-0001", "key-0002"]), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    AttemptResult::FatalError(FatalError::new(FatalClass::NotFound, "no such video"))
                }
            })
            .await;

        match result.unwrap_err() {
            FetchError::Aborted { credential, error } => {
                assert_eq!(credential, "…0001");
                assert_eq!(error.class, FatalClass::NotFound);
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_continue_is_recorded_in_failures() {
        let fetcher = QuotaRotatingFetcher::default();

        let result: Result<u8, _> = fetcher
            .fetch(&keys(&["key-0001"]), |_| async {
                AttemptResult::FatalError(FatalError::new(FatalClass::InvalidRequest, "bad part"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.failures()[0].reason,
            FailureReason::Fatal(ref e) if e.class == FatalClass::InvalidRequest
        ));
    }

    // ── Cancellation ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_calls() {
        let fetcher = QuotaRotatingFetcher::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result = fetcher
            .fetch_cancellable(&keys(&["key-0001"]), &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { AttemptResult::Success(()) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_attempt_stops_rotation() {
        let fetcher = QuotaRotatingFetcher::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result: Result<u8, _> = fetcher
            .fetch_cancellable(&keys(&["key-0001", "key-0002"]), &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    AttemptResult::Success(1)
                }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(!deadline.token().is_cancelled());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(deadline.token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_deadline_stops_its_timer() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let token = deadline.token().clone();

        // A fetch that finishes well inside the deadline.
        let result = QuotaRotatingFetcher::default()
            .fetch_cancellable(&keys(&["key-0001"]), deadline.token(), |_| async {
                AttemptResult::Success(1)
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        drop(deadline);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_deadline_has_no_timer() {
        let deadline = Deadline::from_timeout(None);
        assert!(deadline.timer.is_none());
        assert!(!deadline.token().is_cancelled());
    }

    // ── Pagination ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_paginated_rotates_only_on_whole_attempt_failure() {
        let fetcher = QuotaRotatingFetcher::default();
        let log = Mutex::new(Vec::new());

        // First key dies on page 2; second key walks both pages.
        let result = fetcher
            .fetch_paginated(
                &keys(&["key-0001", "key-0002"]),
                &CancellationToken::new(),
                None,
                |c, cursor| {
                    log.lock()
                        .unwrap()
                        .push((c.token().to_string(), cursor.clone()));
                    let first_key = c.token() == "key-0001";
                    async move {
                        match cursor.as_deref() {
                            None => AttemptResult::Success(Page {
                                items: vec!["a", "b"],
                                next_cursor: Some("p2".to_string()),
                            }),
                            Some(_) if first_key => AttemptResult::QuotaExceeded,
                            Some(_) => AttemptResult::Success(Page {
                                items: vec!["c"],
                                next_cursor: None,
                            }),
                        }
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), vec!["a", "b", "c"]);
        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                ("key-0001".to_string(), None),
                ("key-0001".to_string(), Some("p2".to_string())),
                ("key-0002".to_string(), None),
                ("key-0002".to_string(), Some("p2".to_string())),
            ]
        );
    }
}
