//! Request plumbing shared by the blocking and the async client.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::RequestFailure;

use super::{errors::ApiClientError, types::Endpoint};

pub const USER_AGENT: &str = concat!("parcha-rs/", env!("CARGO_PKG_VERSION"));

/// # Errors
///
/// Fails if provided `Url` cannot be a base. Both clients check this at
/// construction so `endpoint_url` can rely on it.
pub fn check_base(base: Url) -> Result<Url, ApiClientError> {
    if base.cannot_be_a_base() {
        Err(ApiClientError::CannotBeBase(base))
    } else {
        Ok(base)
    }
}

/// `base_url + path`, keeping any path prefix the base already carries.
///
/// # Errors
///
/// Will return `Err` if the URL cannot be a base.
pub fn endpoint_url(base: &Url, endpoint: Endpoint) -> Result<Url, ApiClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ApiClientError::CannotBeBase(base.clone()))?
        .pop_if_empty()
        .push(endpoint.path());
    Ok(url)
}

/// Turns a fully read response into the caller's type, or an error that
/// says which side was at fault.
///
/// # Errors
///
/// `Failure` for any non-2xx status, `InvalidResponse` when a 2xx body
/// is not the JSON we expect.
pub fn decode<T: DeserializeOwned>(
    url: &Url,
    status: StatusCode,
    body: &str,
) -> Result<T, ApiClientError> {
    if !status.is_success() {
        log::debug!("{url} answered {status}: {body}");
        let failure =
            RequestFailure::new(url.clone(), status, error_message(body)).with_body(body);
        return Err(ApiClientError::from(failure));
    }

    log::debug!("Raw API Response: {body}");

    serde_json::from_str(body).map_err(|e| {
        log::error!("Failed to parse JSON response: {e}");
        ApiClientError::InvalidResponse {
            url: url.clone(),
            msg: format!("Failed to parse JSON response: {e}"),
        }
    })
}

// The service reports errors as {"detail": ...}, {"message": ...} or
// {"error": ...}; fall back to the raw body otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message", "error"].iter().find_map(|key| {
                value
                    .get(*key)
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned))
            })
        })
        .unwrap_or_else(|| body.to_owned())
}
