use std::collections::HashMap;

use serde::Serialize;

/// Key name to key value, as exposed by a deployed compute resource.
pub type KeyMap = HashMap<String, String>;

/// A provisioning output that is either resolved or, during a plan-only run,
/// unknown.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution<T> {
    Known(T),
    Unknown,
}

impl<T> Resolution<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Returns the resolved value, if any.
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resolution<U> {
        match self {
            Self::Known(value) => Resolution::Known(f(value)),
            Self::Unknown => Resolution::Unknown,
        }
    }
}

/// Outcome of one validation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EndpointStatus {
    /// The endpoint answered with a 2xx status.
    Success,
    /// Non-2xx answer, described as `"<code>: <reason>"`.
    Failure(String),
    /// The request itself failed (DNS, connect, TLS, timeout).
    Error(String),
}

impl EndpointStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Diagnostic descriptor for a non-success outcome.
    pub fn descriptor(&self) -> Option<String> {
        match self {
            Self::Success => None,
            Self::Failure(status) => Some(status.clone()),
            Self::Error(message) => Some(format!("Error: {message}")),
        }
    }
}

/// States of the endpoint probe. `Succeeded` and `TimedOut` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbeState {
    Probing,
    Succeeded,
    TimedOut,
}

impl ProbeState {
    /// Applies one attempt outcome. `attempts_left` counts attempts still
    /// allowed after this one.
    pub fn next(self, status: &EndpointStatus, attempts_left: usize) -> Self {
        match self {
            Self::Probing if status.is_success() => Self::Succeeded,
            Self::Probing if attempts_left == 0 => Self::TimedOut,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Probing)
    }
}

/// Downstream Event Grid subscription that consumes the validated webhook URL.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubscriptionSpec {
    pub webhook_endpoint: WebhookEndpoint,
    pub event_delivery_schema: String,
    pub included_event_types: Vec<String>,
    pub scope: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct WebhookEndpoint {
    pub url: String,
}

impl EventSubscriptionSpec {
    /// Subscription delivering blob-created events from `scope` to `url`.
    pub fn blob_created(url: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            webhook_endpoint: WebhookEndpoint { url: url.into() },
            event_delivery_schema: "EventGridSchema".to_owned(),
            included_event_types: vec!["Microsoft.Storage.BlobCreated".to_owned()],
            scope: scope.into(),
        }
    }
}

/// Result of a successful readiness gate run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishedWebhook {
    pub key: String,
    pub url: String,
    pub subscription: EventSubscriptionSpec,
}
