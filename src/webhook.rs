use reqwest::Url;

use crate::{ReadinessError, Result};

/// Function name used by the default deployment.
pub const DEFAULT_FUNCTION_NAME: &str = "Function1";

/// Builds the Event Grid extension webhook URL for a Function App.
///
/// Example: `("app.azurewebsites.net", "Function1", "k")` →
/// `"https://app.azurewebsites.net/runtime/webhooks/eventgrid?functionName=Function1&code=k"`
///
/// Query values are form-encoded, so keys containing `=` or `/` survive.
pub fn webhook_url(hostname: &str, function_name: &str, key: &str) -> Result<String> {
    let host = hostname.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(ReadinessError::InvalidUrl("hostname is empty".to_owned()));
    }
    if host.contains(['/', '?', '#', '@']) || host.chars().any(char::is_whitespace) {
        return Err(ReadinessError::InvalidUrl(format!(
            "'{hostname}' is not a bare hostname"
        )));
    }

    let mut url = Url::parse(&format!("https://{host}/runtime/webhooks/eventgrid"))
        .map_err(|err| ReadinessError::InvalidUrl(format!("{hostname}: {err}")))?;
    url.query_pairs_mut()
        .append_pair("functionName", function_name)
        .append_pair("code", key);
    Ok(url.into())
}
