use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Zero-based attempt counter sent with every Web API request.
pub(crate) const RETRY_ATTEMPT_HEADER: &str = "x-chatops-retry-attempt";

/// Backoff stops growing after this many doublings of the base delay.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

const ERROR_BODY_MAX_CHARS: usize = 800;

/// Delay Slack asked for on a rate-limited response. Only the delta-seconds
/// form is used by Slack.
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

/// Wait before the attempt following `attempt` (1-based).
pub(crate) fn backoff_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after: Option<u64>,
) -> Duration {
    if let Some(seconds) = retry_after {
        return Duration::from_secs(seconds);
    }
    let doublings = u32::try_from(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX)
        .min(MAX_BACKOFF_DOUBLINGS);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(1_u64 << doublings))
}

/// Rate limits and server-side failures; anything else is the caller's fault.
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub(crate) fn clip_error_body(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
