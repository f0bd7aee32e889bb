/// Receives progress notifications from the retry loops.
///
/// Injected into [`KeyFetcher`](crate::KeyFetcher) and
/// [`EndpointProbe`](crate::EndpointProbe) so the loops stay testable without a
/// live logging sink.
pub trait PollObserver: Send + Sync {
    /// The key was not present yet; a wait follows.
    fn waiting_for_key(&self, resource: &str, key_name: &str, remaining: usize) {
        let _ = (resource, key_name, remaining);
    }

    /// A validation request did not succeed; `status` is its descriptor.
    fn endpoint_not_ready(&self, url: &str, attempt: usize, status: &str) {
        let _ = (url, attempt, status);
    }

    fn endpoint_ready(&self, url: &str, attempt: usize) {
        let _ = (url, attempt);
    }

    /// Called in plan-only mode instead of any remote call.
    fn skipped_in_plan(&self, what: &str) {
        let _ = what;
    }
}

/// Discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl PollObserver for NoopObserver {}

/// Forwards notifications to `tracing` when the `tracing` feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl PollObserver for LogObserver {
    fn waiting_for_key(&self, resource: &str, key_name: &str, remaining: usize) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            resource,
            key = key_name,
            remaining,
            "waiting for '{}' key to become available ({})",
            key_name,
            remaining
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (resource, key_name, remaining);
    }

    fn endpoint_not_ready(&self, url: &str, attempt: usize, status: &str) {
        #[cfg(feature = "tracing")]
        tracing::debug!(url, attempt, status, "webhook endpoint not ready");
        #[cfg(not(feature = "tracing"))]
        let _ = (url, attempt, status);
    }

    fn endpoint_ready(&self, url: &str, attempt: usize) {
        #[cfg(feature = "tracing")]
        tracing::info!(url, attempt, "webhook endpoint is up");
        #[cfg(not(feature = "tracing"))]
        let _ = (url, attempt);
    }

    fn skipped_in_plan(&self, what: &str) {
        #[cfg(feature = "tracing")]
        tracing::debug!("plan-only run, skipping {}", what);
        #[cfg(not(feature = "tracing"))]
        let _ = what;
    }
}
