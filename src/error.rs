/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    /// The attempt budget ran out before the awaited condition held.
    #[error("timed out waiting for {waiting_for} after {attempts} attempt(s){}", last_status_suffix(.last_status))]
    Timeout {
        /// Human-readable description of the awaited condition.
        waiting_for: String,
        /// Number of attempts that were made.
        attempts: usize,
        /// Status descriptor of the final failed attempt, if any.
        last_status: Option<String>,
    },
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code that does not mean "not ready yet".
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Response decoding or shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// A webhook URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

fn last_status_suffix(last_status: &Option<String>) -> String {
    match last_status {
        Some(status) => format!(" (last status: {status})"),
        None => String::new(),
    }
}

/// Renders `err` followed by its `source()` chain, joined with `: `.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

impl ReadinessError {
    /// Returns `true` for [`ReadinessError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
