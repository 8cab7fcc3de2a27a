//! Response envelope shared by every offline endpoint.
//!
//! ```json
//! { "errno": 0, "error": "", "data": { ... } }
//! ```

use scribe_stream::SessionError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    errno: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// Parse a 200 response body and return its `data` object.
///
/// A missing `errno` is treated as a failure, as is any non-zero value.
pub(crate) fn parse_data(step: &str, body: &str) -> Result<Value, SessionError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| SessionError::ProtocolFormat(format!("{step}: malformed response ({e}): {body}")))?;
    let errno = envelope.errno.as_ref().and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    if errno != Some(0) {
        return Err(SessionError::ServiceException {
            payload: format!("{step}: {body}"),
        });
    }
    envelope
        .data
        .ok_or_else(|| SessionError::ProtocolFormat(format!("{step}: response without data: {body}")))
}

/// String field of `data`, also accepting numbers.
pub(crate) fn string_field(step: &str, data: &Value, field: &str) -> Result<String, SessionError> {
    match data.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(SessionError::ProtocolFormat(format!("{step}: missing '{field}' in {data}"))),
    }
}

/// Progress percentage from `data.progress`.
pub(crate) fn progress_field(data: &Value) -> Result<f64, SessionError> {
    match data.get("progress") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| SessionError::ProtocolFormat(format!("progress out of range: {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| SessionError::ProtocolFormat(format!("progress is not a number: {s}"))),
        _ => Err(SessionError::ProtocolFormat(format!("missing 'progress' in {data}"))),
    }
}

/// Concatenate `data.result[].onebest` in order.
pub(crate) fn transcript_field(data: &Value) -> Result<String, SessionError> {
    let segments = data
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| SessionError::ProtocolFormat(format!("missing 'result' list in {data}")))?;
    Ok(segments
        .iter()
        .filter_map(|seg| seg.get("onebest").and_then(Value::as_str))
        .collect())
}
