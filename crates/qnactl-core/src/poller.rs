//! Progress tracking and operation polling for long-running requests
//!
//! Creating or updating a knowledge base returns an operation location which
//! must be polled until the operation leaves `NotStarted`/`Running`. The
//! poller honors the service's `Retry-After` hint, falling back to a
//! configured default, and can optionally be bounded by a deadline, an attempt
//! budget, or a cancellation token.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_RETRY_INTERVAL_SECS;
use crate::error::{CoreError, Result, TimeoutKind};
use crate::operation::{
    OperationHandle, OperationOutcome, OperationState, PollResult, StatusResponse,
};

/// Anything that can fetch the status of an operation
#[async_trait]
pub trait OperationSource: Send + Sync {
    /// Issue a single status request for `handle`
    async fn fetch_status(&self, handle: &OperationHandle) -> Result<StatusResponse>;
}

#[async_trait]
impl<T: OperationSource + ?Sized> OperationSource for &T {
    async fn fetch_status(&self, handle: &OperationHandle) -> Result<StatusResponse> {
        (**self).fetch_status(handle).await
    }
}

/// Pacing and bounds for a poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Wait used when a status response carries no `Retry-After`
    pub default_retry_interval: Duration,
    /// Overall deadline, measured from the first status check
    pub timeout: Option<Duration>,
    /// Maximum number of status checks; `Some(0)` allows one check
    pub max_attempts: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            timeout: None,
            max_attempts: None,
        }
    }
}

/// Progress events emitted while driving an operation
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Polling has begun
    Started { operation_id: String },
    /// A status check returned
    Polling {
        operation_id: String,
        state: OperationState,
        attempt: u32,
        elapsed: Duration,
    },
    /// Sleeping before the next check
    Waiting {
        operation_id: String,
        delay: Duration,
    },
    /// Terminal state other than `Failed`
    Completed {
        operation_id: String,
        state: OperationState,
        resource_location: Option<String>,
    },
    /// Operation reported `Failed`
    Failed { operation_id: String, error: String },
}

/// Callback type for progress updates
///
/// The CLI uses this to drive its spinner.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Drives one operation to a terminal state
///
/// # Example
///
/// ```rust,ignore
/// use qnactl_core::{OperationPoller, PollerConfig, ProgressEvent};
///
/// let submission = client.create_knowledge_base(&dto).await?;
/// let outcome = OperationPoller::new(&client, PollerConfig::default())
///     .with_progress(Some(Box::new(|event| {
///         if let ProgressEvent::Polling { state, elapsed, .. } = event {
///             println!("{} ({:.0}s)", state, elapsed.as_secs());
///         }
///     })))
///     .drive_to_completion(&submission.handle)
///     .await?;
/// println!("kb id: {:?}", outcome.knowledge_base_id());
/// ```
pub struct OperationPoller<S> {
    source: S,
    config: PollerConfig,
    on_progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
}

impl<S: OperationSource> OperationPoller<S> {
    pub fn new(source: S, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            on_progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, on_progress: Option<ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Stop waiting as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Check the operation status once
    pub async fn poll(&self, handle: &OperationHandle) -> Result<PollResult> {
        let status = self.source.fetch_status(handle).await?;
        if status.retry_after.is_none() {
            debug!(
                "No Retry-After for {}, using default {:?}",
                handle, self.config.default_retry_interval
            );
        }
        Ok(PollResult::from_status(
            status,
            self.config.default_retry_interval,
        ))
    }

    /// Poll until the operation reaches a terminal state
    ///
    /// `Failed` is returned as [`OperationOutcome::Failed`], not as an error.
    /// Errors are reserved for transport/protocol failures, the configured
    /// bounds, and cancellation. None of them are retried.
    pub async fn drive_to_completion(&self, handle: &OperationHandle) -> Result<OperationOutcome> {
        let start = Instant::now();
        // A timeout too large to represent is no deadline at all
        let deadline = self
            .config
            .timeout
            .and_then(|timeout| start.checked_add(timeout));
        let operation_id = handle.operation_id().to_string();
        let mut attempt: u32 = 0;

        self.emit(ProgressEvent::Started {
            operation_id: operation_id.clone(),
        });

        loop {
            attempt += 1;
            let result = self.guarded(self.poll(handle), deadline).await?;
            let state = result.state().clone();

            debug!(
                "Operation {} is {} (attempt {}, {:?} elapsed)",
                operation_id,
                state,
                attempt,
                start.elapsed()
            );
            self.emit(ProgressEvent::Polling {
                operation_id: operation_id.clone(),
                state: state.clone(),
                attempt,
                elapsed: start.elapsed(),
            });

            if state.is_terminal() {
                let outcome = OperationOutcome::from_terminal(result.operation);
                match &outcome {
                    OperationOutcome::Failed { error, .. } => {
                        warn!("Operation {} failed: {}", operation_id, error);
                        self.emit(ProgressEvent::Failed {
                            operation_id,
                            error: error.to_string(),
                        });
                    }
                    _ => {
                        info!("Operation {} finished: {}", operation_id, state);
                        self.emit(ProgressEvent::Completed {
                            operation_id,
                            state,
                            resource_location: outcome.resource_location().map(str::to_string),
                        });
                    }
                }
                return Ok(outcome);
            }

            if let Some(max) = self.config.max_attempts.map(|max| max.max(1))
                && attempt >= max
            {
                warn!(
                    "Operation {} still {} after {} checks, giving up",
                    operation_id, state, attempt
                );
                return Err(CoreError::Timeout(TimeoutKind::Attempts(max)));
            }

            let delay = result.wait_interval;
            debug!("Waiting {:?} before checking {} again", delay, operation_id);
            self.emit(ProgressEvent::Waiting {
                operation_id: operation_id.clone(),
                delay,
            });
            self.guarded(
                async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                },
                deadline,
            )
            .await?;
        }
    }

    /// Race `fut` against cancellation and the deadline
    async fn guarded<T, F>(&self, fut: F, deadline: Option<Instant>) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => {
                info!("Operation polling cancelled");
                Err(CoreError::Cancelled)
            }
            _ = expired => {
                let timeout = self.config.timeout.unwrap_or_default();
                warn!("Operation did not finish within {:?}", timeout);
                Err(CoreError::Timeout(TimeoutKind::Deadline(timeout)))
            }
            result = fut => result,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(cb) = &self.on_progress {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_detail::ErrorDetail;
    use crate::operation::Operation;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// One scripted reply from the fake status endpoint
    enum Reply {
        State(&'static str, Option<u64>),
        Body(serde_json::Value, Option<u64>),
        ProtocolError,
    }

    /// Replays a script; the last reply repeats once the script runs out
    struct ScriptedSource {
        script: Mutex<VecDeque<Reply>>,
        last: Mutex<Option<(serde_json::Value, Option<u64>)>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Reply>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }

        fn gaps(&self) -> Vec<Duration> {
            self.call_times()
                .windows(2)
                .map(|w| w[1] - w[0])
                .collect()
        }
    }

    #[async_trait]
    impl OperationSource for ScriptedSource {
        async fn fetch_status(&self, _handle: &OperationHandle) -> Result<StatusResponse> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            let (body, retry_after) = match next {
                Some(Reply::State(state, retry)) => (json!({ "operationState": state }), retry),
                Some(Reply::Body(body, retry)) => (body, retry),
                Some(Reply::ProtocolError) => {
                    return Err(CoreError::protocol("garbled status body", None));
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("script must not be empty"),
            };
            *self.last.lock().unwrap() = Some((body.clone(), retry_after));

            let operation: Operation = serde_json::from_value(body.clone()).unwrap();
            Ok(StatusResponse {
                operation,
                retry_after: retry_after.map(Duration::from_secs),
                raw_body: body.to_string(),
            })
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("/operations/op-1")
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_for_server_suggested_interval() {
        let source = ScriptedSource::new(vec![
            Reply::State("NotStarted", Some(5)),
            Reply::State("Running", Some(7)),
            Reply::State("Succeeded", None),
        ]);

        let outcome = OperationPoller::new(&source, PollerConfig::default())
            .drive_to_completion(&handle())
            .await
            .unwrap();

        assert!(matches!(outcome, OperationOutcome::Succeeded { .. }));
        assert_eq!(
            source.gaps(),
            vec![Duration::from_secs(5), Duration::from_secs(7)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_retry_after_uses_default() {
        let source = ScriptedSource::new(vec![
            Reply::State("Running", None),
            Reply::State("Succeeded", None),
        ]);

        OperationPoller::new(&source, PollerConfig::default())
            .drive_to_completion(&handle())
            .await
            .unwrap();

        assert_eq!(source.gaps(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_default_interval() {
        let source = ScriptedSource::new(vec![
            Reply::State("Running", None),
            Reply::State("Running", Some(2)),
            Reply::State("Succeeded", None),
        ]);
        let config = PollerConfig {
            default_retry_interval: Duration::from_secs(10),
            ..Default::default()
        };

        OperationPoller::new(&source, config)
            .drive_to_completion(&handle())
            .await
            .unwrap();

        assert_eq!(
            source.gaps(),
            vec![Duration::from_secs(10), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_terminal_state() {
        for terminal in ["Succeeded", "Failed", "Archived"] {
            let source = ScriptedSource::new(vec![
                Reply::State("Running", Some(1)),
                Reply::State(terminal, None),
                Reply::State("Running", Some(1)),
            ]);

            OperationPoller::new(&source, PollerConfig::default())
                .drive_to_completion(&handle())
                .await
                .unwrap();

            assert_eq!(source.call_times().len(), 2, "state {}", terminal);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_terminal_states_poll_forever() {
        let source = ScriptedSource::new(vec![
            Reply::State("NotStarted", None),
            Reply::State("Running", None),
        ]);
        let poller = OperationPoller::new(&source, PollerConfig::default());

        let result =
            tokio::time::timeout(Duration::from_secs(3_601), poller.drive_to_completion(&handle()))
                .await;

        assert!(result.is_err(), "loop must still be running");
        let gaps = source.gaps();
        assert!(gaps.len() >= 119);
        assert!(gaps.iter().all(|gap| *gap == Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_preserves_nested_error_detail() {
        let source = ScriptedSource::new(vec![
            Reply::State("Running", Some(1)),
            Reply::Body(
                json!({
                    "operationState": "Failed",
                    "errorResponse": {
                        "error": {
                            "code": "BadArgument",
                            "message": "m1",
                            "details": [{ "message": "m2" }],
                            "innerError": { "code": "InvalidQnaList" }
                        }
                    }
                }),
                None,
            ),
        ]);

        let outcome = OperationPoller::new(&source, PollerConfig::default())
            .drive_to_completion(&handle())
            .await
            .unwrap();

        match outcome {
            OperationOutcome::Failed { error, .. } => {
                assert_eq!(error.messages(), vec!["m1", "m2"]);
                assert_eq!(
                    error.inner_error.and_then(|inner| inner.code).as_deref(),
                    Some("InvalidQnaList")
                );
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeded_returns_knowledge_base_id() {
        let source = ScriptedSource::new(vec![Reply::Body(
            json!({
                "operationState": "Succeeded",
                "resourceLocation": "/knowledgebases/5b8c0a9d-8e0e-4a57-b3d5-45b1e4a4a1c3"
            }),
            None,
        )]);

        let outcome = OperationPoller::new(&source, PollerConfig::default())
            .drive_to_completion(&handle())
            .await
            .unwrap();

        assert_eq!(
            outcome.knowledge_base_id().as_deref(),
            Some("5b8c0a9d-8e0e-4a57-b3d5-45b1e4a4a1c3")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_fatal() {
        let source = ScriptedSource::new(vec![
            Reply::State("Running", Some(1)),
            Reply::ProtocolError,
            Reply::State("Succeeded", None),
        ]);

        let err = OperationPoller::new(&source, PollerConfig::default())
            .drive_to_completion(&handle())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Protocol { .. }));
        assert_eq!(source.call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_wait() {
        let source = ScriptedSource::new(vec![Reply::State("Running", Some(60))]);
        let config = PollerConfig {
            timeout: Some(Duration::from_secs(90)),
            ..Default::default()
        };

        let start = Instant::now();
        let err = OperationPoller::new(&source, config)
            .drive_to_completion(&handle())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Timeout(TimeoutKind::Deadline(d)) if d == Duration::from_secs(90)
        ));
        assert_eq!(start.elapsed(), Duration::from_secs(90));
        assert_eq!(source.call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget() {
        let source = ScriptedSource::new(vec![Reply::State("Running", Some(1))]);
        let config = PollerConfig {
            max_attempts: Some(3),
            ..Default::default()
        };

        let err = OperationPoller::new(&source, config)
            .drive_to_completion(&handle())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Timeout(TimeoutKind::Attempts(3))));
        assert_eq!(source.call_times().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempt_budget_allows_one_check() {
        let source = ScriptedSource::new(vec![Reply::State("Running", Some(1))]);
        let config = PollerConfig {
            max_attempts: Some(0),
            ..Default::default()
        };

        let err = OperationPoller::new(&source, config)
            .drive_to_completion(&handle())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Timeout(TimeoutKind::Attempts(1))));
        assert_eq!(source.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        for timeout in [Duration::MAX, Duration::from_secs(u64::MAX)] {
            let source = ScriptedSource::new(vec![
                Reply::State("Running", Some(5)),
                Reply::State("Succeeded", None),
            ]);
            let config = PollerConfig {
                timeout: Some(timeout),
                ..Default::default()
            };

            let outcome = OperationPoller::new(&source, config)
                .drive_to_completion(&handle())
                .await
                .unwrap();

            assert!(matches!(outcome, OperationOutcome::Succeeded { .. }));
            assert_eq!(source.gaps(), vec![Duration::from_secs(5)]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let source = ScriptedSource::new(vec![Reply::State("Running", None)]);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let err = OperationPoller::new(&source, PollerConfig::default())
            .with_cancellation(token)
            .drive_to_completion(&handle())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(start.elapsed(), Duration::from_secs(45));
        assert_eq!(source.call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let source = ScriptedSource::new(vec![
            Reply::State("Running", Some(3)),
            Reply::Body(
                json!({
                    "operationState": "Failed",
                    "errorResponse": { "error": { "message": "Unsupported file type" } }
                }),
                None,
            ),
        ]);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        OperationPoller::new(&source, PollerConfig::default())
            .with_progress(Some(Box::new(move |event| {
                sink.lock().unwrap().push(event);
            })))
            .drive_to_completion(&handle())
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], ProgressEvent::Started { operation_id } if operation_id == "op-1"));
        assert!(matches!(&events[1], ProgressEvent::Polling { attempt: 1, state: OperationState::Running, .. }));
        assert!(matches!(&events[2], ProgressEvent::Waiting { delay, .. } if *delay == Duration::from_secs(3)));
        assert!(matches!(&events[3], ProgressEvent::Polling { attempt: 2, .. }));
        assert!(matches!(&events[4], ProgressEvent::Failed { error, .. } if error == "Unsupported file type"));
    }

    #[tokio::test]
    async fn test_single_poll_reports_wait_interval() {
        let source = ScriptedSource::new(vec![Reply::State("Running", Some(5))]);
        let poller = OperationPoller::new(&source, PollerConfig::default());

        let result = poller.poll(&handle()).await.unwrap();
        assert_eq!(result.state(), &OperationState::Running);
        assert_eq!(result.wait_interval, Duration::from_secs(5));
        assert!(result.raw_body.contains("Running"));

        let detail = ErrorDetail::with_message("unused");
        assert_eq!(detail.messages(), vec!["unused"]);
    }
}
