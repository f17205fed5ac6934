//! HTTP request descriptors and their execution over an [`HttpTransport`].
//!
//! An `http_request` action describes its request in the payload, optionally
//! refined by structured fields filled by the config parser:
//!
//! ```text
//! method: post
//! url: http://homeassistant.local/api/webhook/desk
//! headers:
//!   - Content-Type: application/json
//! body: {"on": true}
//! retries: 2
//! ```

use tracing::{debug, info, instrument, warn};

use super::status::{ActionStatus, FAILURE_CODE};
use crate::config::parser::{parse_u32, strip_quotes, unescape_newlines};
use crate::config::{ActionConfig, ConfigLimits, HttpRequestDefinition};
use crate::device::HttpTransport;

/// Parse a payload descriptor. Unknown fields and bad numbers are ignored.
#[must_use]
pub fn parse_request_descriptor(payload: &str) -> HttpRequestDefinition {
    let mut definition = HttpRequestDefinition::default();
    let expanded = unescape_newlines(payload);
    let mut in_headers = false;

    for line in expanded.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed == "headers:" {
            in_headers = true;
            continue;
        }
        if in_headers {
            if let Some(entry) = trimmed.strip_prefix('-') {
                if let Some((name, value)) = entry.split_once(':') {
                    definition.headers.insert(
                        name.trim().to_string(),
                        strip_quotes(value.trim()).to_string(),
                    );
                }
                continue;
            }
            in_headers = false;
        }

        let Some((field, value)) = trimmed.split_once(':') else {
            continue;
        };
        let value = strip_quotes(value.trim());
        match field.trim() {
            "method" => definition.method = value.to_string(),
            "url" => definition.url = value.to_string(),
            "body" => definition.body = value.to_string(),
            "timeout_ms" | "timeout" => {
                if let Some(timeout) = parse_u32(value) {
                    definition.timeout_ms = timeout;
                }
            }
            "retries" | "retry" => match parse_u32(value) {
                Some(retries) => definition.retries = retries,
                None => warn!(value, "Invalid retries value"),
            },
            other => debug!(field = other, "Ignoring request field"),
        }
    }
    definition
}

/// The request an action describes: the parsed payload, overlaid with the
/// structured fields the config sets.
///
/// A structured field counts as set when it differs from its default. Headers
/// are merged, structured names overwriting payload ones.
#[must_use]
pub fn request_for_action(action: &ActionConfig) -> HttpRequestDefinition {
    let mut definition = parse_request_descriptor(&action.payload);
    let Some(structured) = &action.http_request else {
        return definition;
    };
    let defaults = HttpRequestDefinition::default();

    if !structured.method.eq_ignore_ascii_case(&defaults.method) {
        definition.method.clone_from(&structured.method);
    }
    if !structured.url.is_empty() {
        definition.url.clone_from(&structured.url);
    }
    if !structured.body.is_empty() {
        definition.body.clone_from(&structured.body);
    }
    if structured.timeout_ms != defaults.timeout_ms {
        definition.timeout_ms = structured.timeout_ms;
    }
    if structured.retries != defaults.retries {
        definition.retries = structured.retries;
    }
    definition.headers.extend(
        structured
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    definition
}

/// Perform `definition` with up to `retries + 1` attempts.
///
/// A 2xx answer succeeds; the first other positive status fails with that
/// code; attempts that cannot connect are retried.
#[instrument(skip_all, fields(url = %definition.url))]
pub fn execute_request(
    definition: &HttpRequestDefinition,
    transport: &mut dyn HttpTransport,
    limits: &ConfigLimits,
) -> ActionStatus {
    if definition.url.is_empty() {
        return ActionStatus::failure(FAILURE_CODE, "http_request missing url");
    }

    let method = definition.method.to_ascii_uppercase();
    let retries = if definition.retries > limits.max_http_retries {
        warn!(
            retries = definition.retries,
            max = limits.max_http_retries,
            "Clamping retries"
        );
        limits.max_http_retries
    } else {
        definition.retries
    };
    let body = (!definition.body.is_empty()).then_some(definition.body.as_str());

    for attempt in 0..=retries {
        if !transport.begin(&definition.url) {
            debug!(attempt, "Request could not be started");
            continue;
        }
        transport.set_timeout(definition.timeout_ms);
        for (name, value) in &definition.headers {
            transport.add_header(name, value);
        }
        let status = transport.send_request(&method, body);
        transport.end();

        if (200..300).contains(&status) {
            info!(%method, status, attempt, "Request succeeded");
            return ActionStatus::ok_with(status, "ok");
        }
        if status > 0 {
            warn!(%method, status, attempt, "Request rejected");
            return ActionStatus::failure(status, "http_request failed");
        }
        debug!(attempt, status, "Connection failed");
    }

    warn!(%method, attempts = u64::from(retries) + 1, "Request failed to connect");
    ActionStatus::failure(FAILURE_CODE, "http_request failed to connect")
}
