//! Helpers shared by the REST providers

use crate::error::PastizalesError;
use crate::metrics::record_upstream_call;

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Google API error body
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Extract a human readable message from an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.trim().to_string(),
    }
}

/// Send a request and decode a successful JSON response.
///
/// Non-success statuses become [PastizalesError::Upstream] carrying the message from the body.
///
/// # Arguments
///
/// * `service`: Name of the upstream service, used in errors and metrics
/// * `request`: The prepared request
pub async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, PastizalesError> {
    match send_json_optional(service, request).await? {
        Some(value) => Ok(value),
        None => Err(PastizalesError::Upstream {
            service,
            status: 404,
            message: "not found".to_string(),
        }),
    }
}

/// Like [send_json] but a 404 response yields `Ok(None)`.
pub async fn send_json_optional<T: DeserializeOwned>(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Option<T>, PastizalesError> {
    let response = request.send().await.map_err(|e| {
        record_upstream_call(service, false);
        PastizalesError::from(e)
    })?;
    let status = response.status();
    let body = response.text().await?;
    if status == reqwest::StatusCode::NOT_FOUND {
        record_upstream_call(service, true);
        return Ok(None);
    }
    if !status.is_success() {
        record_upstream_call(service, false);
        return Err(PastizalesError::Upstream {
            service,
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    record_upstream_call(service, true);
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|source| PastizalesError::UpstreamDecode { service, source })
}
