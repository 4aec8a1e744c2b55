use serde::Serialize;

use crate::salute::UPSTREAM_BODY_PREVIEW_CHARS;

pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

/// Lossy UTF-8 view of an upstream body, cut to [`UPSTREAM_BODY_PREVIEW_CHARS`].
pub(crate) fn body_preview(bytes: &[u8]) -> String {
    let raw_body = String::from_utf8_lossy(bytes);
    format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
}

/// Space-separated hex of the first `max` bytes, with `...` when truncated.
pub(crate) fn hex_preview(bytes: &[u8], max: usize) -> String {
    let mut out = bytes
        .iter()
        .take(max)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > max {
        out.push_str("...");
    }
    out
}
