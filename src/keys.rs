use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use tokio::time::sleep;

use crate::{
    observer::{LogObserver, PollObserver},
    wire::HostKeys,
    ExecutionMode, KeyMap, PollOptions, ReadinessError, Resolution, Result,
};

/// System key the Event Grid extension registers on a Function App host.
pub const EVENTGRID_EXTENSION_KEY: &str = "eventgrid_extension";

const ARM_BASE_URL: &str = "https://management.azure.com";
const WEB_API_VERSION: &str = "2022-03-01";

/// A provisioned resource that can report its current key map on demand.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Name used to correlate log output with the resource.
    fn resource_name(&self) -> &str;

    /// Reads the current key map. A key that is not provisioned yet is simply
    /// absent from the map.
    async fn current_keys(&self) -> Result<KeyMap>;
}

/// Polls a [`KeySource`] until a named key appears.
#[derive(Clone)]
pub struct KeyFetcher {
    options: PollOptions,
    mode: ExecutionMode,
    observer: Arc<dyn PollObserver>,
}

impl fmt::Debug for KeyFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFetcher")
            .field("options", &self.options)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Default for KeyFetcher {
    fn default() -> Self {
        Self::new(ExecutionMode::Apply)
    }
}

impl KeyFetcher {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            options: PollOptions::default(),
            mode,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_options(mut self, opts: PollOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the value of `key_name` once `source` exposes it.
    ///
    /// The key map is queried immediately; while the key is missing and
    /// `max_attempts` remaining attempts are left, the fetcher waits one poll
    /// interval and queries again. With the key absent and no attempts left it
    /// fails with [`ReadinessError::Timeout`]. An empty value counts as absent.
    ///
    /// In plan-only mode nothing is queried and [`Resolution::Unknown`] is
    /// returned.
    pub async fn fetch_key<S>(
        &self,
        source: &S,
        key_name: &str,
        max_attempts: usize,
    ) -> Result<Resolution<String>>
    where
        S: KeySource + ?Sized,
    {
        if self.mode.is_plan() {
            self.observer.skipped_in_plan(&format!("fetch of key '{key_name}'"));
            return Ok(Resolution::Unknown);
        }

        for remaining in (0..=max_attempts).rev() {
            let mut keys = source.current_keys().await?;
            if let Some(value) = keys.remove(key_name).filter(|value| !value.is_empty()) {
                return Ok(Resolution::Known(value));
            }

            if remaining == 0 {
                break;
            }

            self.observer
                .waiting_for_key(source.resource_name(), key_name, remaining);
            sleep(self.options.poll_interval()).await;
        }

        Err(ReadinessError::Timeout {
            waiting_for: format!("key '{key_name}' on {}", source.resource_name()),
            attempts: max_attempts + 1,
            last_status: None,
        })
    }
}

/// Reads Function App host keys through the Azure Resource Manager
/// `host/default/listkeys` action. The polled map is `systemKeys`.
#[derive(Clone)]
pub struct ArmKeySource {
    http: reqwest::Client,
    base_url: String,
    subscription_id: String,
    resource_group: String,
    function_app: String,
    authorization: String,
    options: PollOptions,
}

impl fmt::Debug for ArmKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmKeySource")
            .field("base_url", &self.base_url)
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .field("function_app", &self.function_app)
            .field("authorization", &"<redacted>")
            .finish()
    }
}

impl ArmKeySource {
    /// Creates a key source for `function_app`, authenticated with an ARM
    /// access token. The `Bearer ` prefix is added when missing.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        function_app: impl Into<String>,
        token: impl AsRef<str>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: ARM_BASE_URL.to_owned(),
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            function_app: function_app.into(),
            authorization: normalize_bearer_authorization(token.as_ref()),
            options: PollOptions::default(),
        }
    }

    /// Creates a key source from environment variables.
    ///
    /// Reads:
    /// - `AZURE_SUBSCRIPTION_ID`
    /// - `AZURE_RESOURCE_GROUP`
    /// - `AZURE_FUNCTION_APP`
    /// - `AZURE_ACCESS_TOKEN` (Bearer prefix optional)
    ///
    /// Returns [`ReadinessError::Config`] if a variable is missing or empty.
    pub fn from_env() -> Result<Self> {
        let subscription_id = required_env("AZURE_SUBSCRIPTION_ID")?;
        let resource_group = required_env("AZURE_RESOURCE_GROUP")?;
        let function_app = required_env("AZURE_FUNCTION_APP")?;
        let token = required_env("AZURE_ACCESS_TOKEN")?;
        Ok(Self::new(subscription_id, resource_group, function_app, token))
    }

    /// Overrides the Resource Manager endpoint, e.g. for sovereign clouds.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Applies the per-request timeout from `opts`.
    pub fn with_options(mut self, opts: PollOptions) -> Self {
        self.options = opts;
        self
    }

    fn list_keys_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}/host/default/listkeys?api-version={}",
            self.base_url,
            self.subscription_id,
            self.resource_group,
            self.function_app,
            WEB_API_VERSION
        )
    }

    async fn list_host_keys(&self) -> Result<Option<HostKeys>> {
        let response = self
            .http
            .post(self.list_keys_url())
            .header(header::AUTHORIZATION, &self.authorization)
            .body("")
            .timeout(self.options.request_timeout())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if is_not_ready_transport(&err) => return Ok(None),
            Err(err) => return Err(ReadinessError::Transport(err)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) if is_not_ready_transport(&err) => return Ok(None),
            Err(err) => return Err(ReadinessError::Transport(err)),
        };

        if !status.is_success() {
            if is_not_ready_status(status) {
                return Ok(None);
            }
            return Err(ReadinessError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<HostKeys>(&body)
            .map(Some)
            .map_err(|err| ReadinessError::Decode(format!("invalid host keys JSON: {err}")))
    }
}

#[async_trait]
impl KeySource for ArmKeySource {
    fn resource_name(&self) -> &str {
        &self.function_app
    }

    async fn current_keys(&self) -> Result<KeyMap> {
        Ok(self
            .list_host_keys()
            .await?
            .map(|keys| keys.system_keys)
            .unwrap_or_default())
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map_err(|_| ReadinessError::Config(format!("missing {name} environment variable")))?;
    if value.trim().is_empty() {
        return Err(ReadinessError::Config(format!("{name} is set but empty")));
    }
    Ok(value)
}

// A freshly created site answers listkeys with 404/409 or a gateway error
// until the host runtime is up.
fn is_not_ready_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

// Connect failures, per-request timeouts and bodies cut off mid-read. A body
// read failure surfaces as a decode error wrapping the body error.
fn is_not_ready_transport(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() || err.is_body() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(inner) = cause.downcast_ref::<reqwest::Error>() {
            if inner.is_timeout() || inner.is_body() {
                return true;
            }
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
