use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{
    error::error_chain,
    observer::{LogObserver, PollObserver},
    wire::{self, EVENT_TYPE_HEADER, SUBSCRIPTION_VALIDATION},
    EndpointStatus, ExecutionMode, PollOptions, ProbeState, ReadinessError, Result,
};

/// Sends one subscription-validation request and classifies the outcome.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn send_validation(&self, url: &str) -> EndpointStatus;
}

#[async_trait]
impl<T: ProbeTransport + ?Sized> ProbeTransport for Arc<T> {
    async fn send_validation(&self, url: &str) -> EndpointStatus {
        (**self).send_validation(url).await
    }
}

/// [`ProbeTransport`] over `reqwest` with a per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(PollOptions::default().request_timeout())
    }
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ProbeTransport for HttpTransport {
    async fn send_validation(&self, url: &str) -> EndpointStatus {
        let response = self
            .http
            .post(url)
            .header(EVENT_TYPE_HEADER, SUBSCRIPTION_VALIDATION)
            .timeout(self.timeout)
            .json(&wire::validation_body())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => EndpointStatus::Success,
            Ok(response) => {
                let status = response.status();
                EndpointStatus::Failure(format!(
                    "{}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                ))
            }
            Err(err) => EndpointStatus::Error(error_chain(&err)),
        }
    }
}

/// Polls a webhook endpoint with the validation handshake until it answers 2xx.
#[derive(Clone)]
pub struct EndpointProbe<T = HttpTransport> {
    transport: T,
    options: PollOptions,
    mode: ExecutionMode,
    observer: Arc<dyn PollObserver>,
}

impl<T: fmt::Debug> fmt::Debug for EndpointProbe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointProbe")
            .field("transport", &self.transport)
            .field("options", &self.options)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl EndpointProbe<HttpTransport> {
    /// Creates a probe that sends real HTTP requests.
    pub fn new(mode: ExecutionMode) -> Self {
        Self::with_transport(HttpTransport::default(), mode)
    }

    /// Applies pacing, budget and per-request timeout.
    pub fn with_options(mut self, opts: PollOptions) -> Self {
        self.transport = HttpTransport::new(opts.request_timeout());
        self.options = opts;
        self
    }
}

impl<T: ProbeTransport> EndpointProbe<T> {
    pub fn with_transport(transport: T, mode: ExecutionMode) -> Self {
        Self {
            transport,
            options: PollOptions::default(),
            mode,
            observer: Arc::new(LogObserver),
        }
    }

    /// Replaces pacing and budget without touching the transport.
    pub fn with_poll_options(mut self, opts: PollOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Probes `url` with the configured attempt budget.
    pub async fn wait_for_endpoint(&self, url: &str) -> Result<String> {
        self.wait_for_endpoint_with(url, self.options.probe_attempts)
            .await
    }

    /// Probes `url` up to `max_attempts` times, one poll interval apart.
    ///
    /// Returns `url` on the first 2xx answer. Non-2xx answers and transport
    /// errors both count as "not ready yet". No wait follows the final
    /// attempt. In plan-only mode `url` is returned unchanged without any
    /// request.
    pub async fn wait_for_endpoint_with(&self, url: &str, max_attempts: usize) -> Result<String> {
        if self.mode.is_plan() {
            self.observer.skipped_in_plan(&format!("probe of {url}"));
            return Ok(url.to_owned());
        }

        let mut state = ProbeState::Probing;
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            let status = self.transport.send_validation(url).await;
            state = state.next(&status, max_attempts - attempt);

            match state {
                ProbeState::Succeeded => {
                    self.observer.endpoint_ready(url, attempt);
                    return Ok(url.to_owned());
                }
                ProbeState::Probing => {
                    let descriptor = status.descriptor().unwrap_or_default();
                    self.observer.endpoint_not_ready(url, attempt, &descriptor);
                    last_status = Some(descriptor);
                    sleep(self.options.poll_interval()).await;
                }
                ProbeState::TimedOut => {
                    let descriptor = status.descriptor().unwrap_or_default();
                    self.observer.endpoint_not_ready(url, attempt, &descriptor);
                    last_status = Some(descriptor);
                    break;
                }
            }
        }

        Err(ReadinessError::Timeout {
            waiting_for: format!("webhook endpoint {url}"),
            attempts: max_attempts,
            last_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::{EndpointProbe, ProbeTransport};
    use crate::observer::recording::{Event, RecordingObserver};
    use crate::{EndpointStatus, ExecutionMode, PollOptions, ReadinessError};

    const INTERVAL: Duration = Duration::from_secs(10);
    const URL: &str = "https://azfun1app.azurewebsites.net/runtime/webhooks/eventgrid?functionName=Function1&code=k";

    struct ScriptedTransport {
        script: Mutex<VecDeque<EndpointStatus>>,
        fallback: EndpointStatus,
        requests: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<EndpointStatus>, fallback: EndpointStatus) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                requests: AtomicUsize::new(0),
            }
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProbeTransport for ScriptedTransport {
        async fn send_validation(&self, _url: &str) -> EndpointStatus {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .expect("script mutex")
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn failure(code: &str) -> EndpointStatus {
        EndpointStatus::Failure(code.to_owned())
    }

    fn probe(
        transport: Arc<ScriptedTransport>,
        mode: ExecutionMode,
        observer: Arc<RecordingObserver>,
    ) -> EndpointProbe<Arc<ScriptedTransport>> {
        EndpointProbe::with_transport(transport, mode)
            .with_poll_options(PollOptions {
                poll_interval_ms: INTERVAL.as_millis() as u64,
                ..PollOptions::default()
            })
            .with_observer(observer)
    }

    fn assert_elapsed(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    #[tokio::test]
    async fn plan_mode_returns_url_without_requests() {
        let transport = Arc::new(ScriptedTransport::new(vec![], failure("500: x")));
        let observer = Arc::new(RecordingObserver::default());

        let url = probe(transport.clone(), ExecutionMode::Plan, observer.clone())
            .wait_for_endpoint_with(URL, 30)
            .await
            .expect("plan mode never fails");

        assert_eq!(url, URL);
        assert_eq!(transport.requests(), 0);
        assert!(matches!(observer.take().as_slice(), [Event::Skipped(_)]));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fifth_request_after_four_waits() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                failure("500: Internal Server Error"),
                failure("500: Internal Server Error"),
                failure("500: Internal Server Error"),
                failure("500: Internal Server Error"),
                EndpointStatus::Success,
            ],
            failure("500: Internal Server Error"),
        ));
        let observer = Arc::new(RecordingObserver::default());
        let started = Instant::now();

        let url = probe(transport.clone(), ExecutionMode::Apply, observer.clone())
            .wait_for_endpoint_with(URL, 30)
            .await
            .expect("fifth attempt succeeds");

        assert_eq!(url, URL);
        assert_eq!(transport.requests(), 5);
        assert_elapsed(started, INTERVAL * 4);
        let events = observer.take();
        assert_eq!(events.len(), 5);
        assert_eq!(events[4], Event::Ready { attempt: 5 });
    }

    #[tokio::test(start_paused = true)]
    async fn always_unavailable_times_out_after_budget() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![],
            failure("503: Service Unavailable"),
        ));
        let started = Instant::now();

        let err = probe(
            transport.clone(),
            ExecutionMode::Apply,
            Arc::new(RecordingObserver::default()),
        )
        .wait_for_endpoint_with(URL, 3)
        .await
        .expect_err("must time out");

        assert_eq!(transport.requests(), 3);
        assert_elapsed(started, INTERVAL * 2);
        match err {
            ReadinessError::Timeout {
                attempts,
                last_status,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status.as_deref(), Some("503: Service Unavailable"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_treated_like_failed_status() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                EndpointStatus::Error("connection refused".to_owned()),
                failure("502: Bad Gateway"),
                EndpointStatus::Success,
            ],
            failure("500: x"),
        ));
        let observer = Arc::new(RecordingObserver::default());

        probe(transport.clone(), ExecutionMode::Apply, observer.clone())
            .wait_for_endpoint_with(URL, 30)
            .await
            .expect("third attempt succeeds");

        assert_eq!(
            observer.take(),
            vec![
                Event::NotReady {
                    attempt: 1,
                    status: "Error: connection refused".to_owned()
                },
                Event::NotReady {
                    attempt: 2,
                    status: "502: Bad Gateway".to_owned()
                },
                Event::Ready { attempt: 3 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn last_error_descriptor_surfaces_in_timeout() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![],
            EndpointStatus::Error("dns error".to_owned()),
        ));

        let err = probe(
            transport,
            ExecutionMode::Apply,
            Arc::new(RecordingObserver::default()),
        )
        .wait_for_endpoint_with(URL, 2)
        .await
        .expect_err("must time out");

        assert!(err.to_string().contains("last status: Error: dns error"));
    }

    #[tokio::test]
    async fn zero_budget_times_out_without_requests() {
        let transport = Arc::new(ScriptedTransport::new(vec![], EndpointStatus::Success));

        let err = probe(
            transport.clone(),
            ExecutionMode::Apply,
            Arc::new(RecordingObserver::default()),
        )
        .wait_for_endpoint_with(URL, 0)
        .await
        .expect_err("no attempts allowed");

        assert!(err.is_timeout());
        assert_eq!(transport.requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_budget_is_used_by_default() {
        let transport = Arc::new(ScriptedTransport::new(vec![], failure("404: Not Found")));

        let err = EndpointProbe::with_transport(transport.clone(), ExecutionMode::Apply)
            .with_poll_options(PollOptions {
                poll_interval_ms: 1,
                probe_attempts: 4,
                ..PollOptions::default()
            })
            .with_observer(Arc::new(RecordingObserver::default()))
            .wait_for_endpoint(URL)
            .await
            .expect_err("must time out");

        assert!(err.is_timeout());
        assert_eq!(transport.requests(), 4);
    }
}
