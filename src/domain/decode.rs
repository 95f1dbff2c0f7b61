//! Decoding of evaluate payloads into JSON.

use serde_json::Value as JsonValue;

/// Default cap on raw text echoed back when a payload fails to parse.
pub const DEFAULT_RAW_PREVIEW_LIMIT: usize = 2000;

/// Appended to raw text that was cut at the preview limit.
pub const TRUNCATION_MARKER: &str = "...<truncated>";

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResponse {
    Structured(JsonValue),
    Unstructured { raw: String, parse_error: String },
}

/// Decodes the payload as UTF-8 text, then parses it as strict JSON.
///
/// Never fails: a parse failure comes back as [`DecodedResponse::Unstructured`] carrying the
/// decoded text and the parser's message. Invalid UTF-8 sequences are replaced, not rejected.
pub fn decode_payload(payload: &[u8]) -> DecodedResponse {
    let text = String::from_utf8_lossy(payload).into_owned();
    match serde_json::from_str::<JsonValue>(&text) {
        Ok(value) => DecodedResponse::Structured(value),
        Err(e) => DecodedResponse::Unstructured {
            raw: text,
            parse_error: e.to_string(),
        },
    }
}

/// Keeps the first `max_chars` characters and appends [`TRUNCATION_MARKER`] when cut.
pub fn truncate_raw(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
