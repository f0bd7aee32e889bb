use std::fmt;
use std::sync::Arc;

use crate::{
    keys::{KeyFetcher, KeySource, EVENTGRID_EXTENSION_KEY},
    observer::{LogObserver, PollObserver},
    probe::{EndpointProbe, HttpTransport, ProbeTransport},
    webhook::{webhook_url, DEFAULT_FUNCTION_NAME},
    EventSubscriptionSpec, ExecutionMode, PollOptions, PublishedWebhook, Resolution, Result,
};

/// Waits until a Function App's Event Grid webhook is usable and publishes
/// it for the downstream event subscription.
///
/// Runs strictly in sequence: fetch the `eventgrid_extension` system key,
/// derive the webhook URL, then probe it with the validation handshake.
pub struct ReadinessGate<T = HttpTransport> {
    fetcher: KeyFetcher,
    probe: EndpointProbe<T>,
    options: PollOptions,
    function_name: String,
    scope: String,
}

impl<T: fmt::Debug> fmt::Debug for ReadinessGate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("fetcher", &self.fetcher)
            .field("probe", &self.probe)
            .field("function_name", &self.function_name)
            .field("scope", &self.scope)
            .finish()
    }
}

impl ReadinessGate<HttpTransport> {
    /// Creates a gate that probes over HTTP. `scope` is the resource id the
    /// event subscription is attached to (the metadata storage account).
    pub fn new(mode: ExecutionMode, scope: impl Into<String>) -> Self {
        Self::with_transport(HttpTransport::default(), mode, scope)
    }

    /// Applies pacing, budgets and per-request timeout to both stages.
    pub fn with_options(mut self, opts: PollOptions) -> Self {
        self.fetcher = self.fetcher.with_options(opts.clone());
        self.probe = self.probe.with_options(opts.clone());
        self.options = opts;
        self
    }
}

impl<T: ProbeTransport> ReadinessGate<T> {
    pub fn with_transport(transport: T, mode: ExecutionMode, scope: impl Into<String>) -> Self {
        let observer: Arc<dyn PollObserver> = Arc::new(LogObserver);
        Self {
            fetcher: KeyFetcher::new(mode).with_observer(observer.clone()),
            probe: EndpointProbe::with_transport(transport, mode).with_observer(observer),
            options: PollOptions::default(),
            function_name: DEFAULT_FUNCTION_NAME.to_owned(),
            scope: scope.into(),
        }
    }

    /// Replaces pacing and budgets without touching the transport.
    pub fn with_poll_options(mut self, opts: PollOptions) -> Self {
        self.fetcher = self.fetcher.with_options(opts.clone());
        self.probe = self.probe.with_poll_options(opts.clone());
        self.options = opts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.fetcher = self.fetcher.with_observer(observer.clone());
        self.probe = self.probe.with_observer(observer);
        self
    }

    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = function_name.into();
        self
    }

    /// Fetches the key from `source`, derives the webhook URL on `hostname`
    /// and waits for the endpoint to answer the validation handshake.
    ///
    /// Returns [`Resolution::Unknown`] in plan-only mode.
    pub async fn publish<S>(&self, source: &S, hostname: &str) -> Result<Resolution<PublishedWebhook>>
    where
        S: KeySource + ?Sized,
    {
        let key = match self
            .fetcher
            .fetch_key(source, EVENTGRID_EXTENSION_KEY, self.options.key_attempts)
            .await?
        {
            Resolution::Known(key) => key,
            Resolution::Unknown => return Ok(Resolution::Unknown),
        };

        let url = webhook_url(hostname, &self.function_name, &key)?;
        let url = self.probe.wait_for_endpoint(&url).await?;

        Ok(Resolution::Known(PublishedWebhook {
            subscription: EventSubscriptionSpec::blob_created(url.clone(), self.scope.clone()),
            key,
            url,
        }))
    }
}
