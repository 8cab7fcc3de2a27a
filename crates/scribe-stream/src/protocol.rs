//! Inbound event decoding.
//!
//! Every dialect reports progress through an integer status field. A
//! [`DialectProfile`] is the table that maps those integers onto
//! [`ProtocolEvent`], so the collector never sees vendor codes.

use scribe_settings::Dialect;
use serde_json::Value;

use crate::errors::SessionError;

/// One decoded inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Handshake, keepalive, or progress notification. Nothing to append.
    Ack,
    /// A recognized text fragment.
    Partial(String),
    /// The last fragment. No further events follow.
    Final(String),
    /// Malformed payload or a data-format error reported by the service.
    Warning(String),
    /// Service-side failure; carries the raw payload.
    FatalError(String),
}

/// How a status code is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    /// Decodes to [`ProtocolEvent::Ack`].
    Ack,
    /// Decodes to [`ProtocolEvent::Partial`] when the text field is present.
    Partial,
    /// Decodes to [`ProtocolEvent::Final`].
    Final,
    /// Decodes to [`ProtocolEvent::Warning`].
    FormatError,
}

/// Wire mapping for one streaming dialect.
#[derive(Debug)]
pub struct DialectProfile {
    /// Name of the integer status field in every event.
    pub status_field: &'static str,
    /// Status code of a positive handshake reply; `None` when the dialect has no handshake.
    pub handshake_ack: Option<i64>,
    /// Known status codes. Anything else is a service exception.
    pub codes: &'static [(i64, EventClass)],
    /// JSON pointer of the recognized text in result events.
    pub text_pointer: &'static str,
    /// JSON pointer in the start message that receives the product id.
    pub product_id_pointer: Option<&'static str>,
    /// JSON pointer in the start message that receives a per-session request id.
    pub request_id_pointer: Option<&'static str>,
}

static LASR_LIVE: DialectProfile = DialectProfile {
    status_field: "errno",
    handshake_ack: Some(7),
    codes: &[
        (8, EventClass::Ack),
        (0, EventClass::Partial),
        (9, EventClass::Final),
        (10, EventClass::FormatError),
    ],
    text_pointer: "/data/onebest",
    product_id_pointer: None,
    request_id_pointer: None,
};

// Realtime feedback (eof 0) is a provisional hypothesis that the final
// result restates, so it is progress only.
static DUI_REALTIME: DialectProfile = DialectProfile {
    status_field: "eof",
    handshake_ack: None,
    codes: &[(0, EventClass::Ack), (1, EventClass::Final)],
    text_pointer: "/result/rec",
    product_id_pointer: Some("/context/productId"),
    request_id_pointer: Some("/request/requestId"),
};

impl DialectProfile {
    /// Profile for a streaming dialect; `None` for the polling dialect.
    pub fn for_dialect(dialect: Dialect) -> Option<&'static DialectProfile> {
        match dialect {
            Dialect::LasrLive => Some(&LASR_LIVE),
            Dialect::DuiRealtime => Some(&DUI_REALTIME),
            Dialect::LasrFile => None,
        }
    }

    /// Class of a status code, `None` if the code is unknown.
    pub fn classify(&self, code: i64) -> Option<EventClass> {
        self.codes
            .iter()
            .find_map(|(c, class)| (*c == code).then_some(*class))
    }

    /// Decode one text frame.
    pub fn decode(&self, raw: &str) -> ProtocolEvent {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => return ProtocolEvent::Warning(format!("malformed event ({e}): {raw}")),
        };
        let Some(code) = status_code(&value, self.status_field) else {
            return ProtocolEvent::Warning(format!(
                "event without integer '{}': {raw}",
                self.status_field
            ));
        };
        match self.classify(code) {
            Some(EventClass::Ack) => ProtocolEvent::Ack,
            Some(EventClass::Partial) => match self.text(&value) {
                Some(text) => ProtocolEvent::Partial(text),
                None => ProtocolEvent::Ack,
            },
            Some(EventClass::Final) => ProtocolEvent::Final(self.text(&value).unwrap_or_default()),
            Some(EventClass::FormatError) => {
                ProtocolEvent::Warning(format!("service reported data format error: {raw}"))
            }
            None => ProtocolEvent::FatalError(raw.to_owned()),
        }
    }

    /// Check the reply to the start message.
    pub fn check_handshake(&self, raw: &str) -> Result<(), SessionError> {
        let Some(expected) = self.handshake_ack else {
            return Ok(());
        };
        let code = serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| status_code(&v, self.status_field));
        if code == Some(expected) {
            Ok(())
        } else {
            Err(SessionError::Handshake(raw.to_owned()))
        }
    }

    fn text(&self, value: &Value) -> Option<String> {
        value
            .pointer(self.text_pointer)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

/// Integer status, also accepting numeric strings.
fn status_code(value: &Value, field: &str) -> Option<i64> {
    match value.get(field)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
