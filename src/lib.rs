//! `eventgrid-readiness` gates an Azure Event Grid subscription on a freshly
//! deployed Function App.
//!
//! A new Function App neither exposes the `eventgrid_extension` system key nor
//! accepts traffic right away. The crate bridges that gap with two bounded
//! retry loops:
//! - [`KeyFetcher::fetch_key`] polls the app's key map until the key appears
//! - [`EndpointProbe::wait_for_endpoint`] sends the subscription-validation
//!   handshake until the webhook answers 2xx
//!
//! [`ReadinessGate::publish`] runs both and yields the webhook URL together
//! with the [`EventSubscriptionSpec`] that consumes it. Under
//! [`ExecutionMode::Plan`] nothing remote is touched.

mod error;
mod gate;
mod keys;
mod observer;
mod options;
mod probe;
mod types;
mod webhook;
mod wire;

pub use error::ReadinessError;
pub use gate::ReadinessGate;
pub use keys::{ArmKeySource, KeyFetcher, KeySource, EVENTGRID_EXTENSION_KEY};
pub use observer::{LogObserver, NoopObserver, PollObserver};
pub use options::{ExecutionMode, PollOptions};
pub use probe::{EndpointProbe, HttpTransport, ProbeTransport};
pub use types::{
    EndpointStatus, EventSubscriptionSpec, KeyMap, ProbeState, PublishedWebhook, Resolution,
    WebhookEndpoint,
};
pub use webhook::{webhook_url, DEFAULT_FUNCTION_NAME};

pub type Result<T> = std::result::Result<T, ReadinessError>;
