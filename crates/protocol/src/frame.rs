//! Frame encoding and decoding.

use {
    crate::{Error, Result, event::PushFrame},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{trace, warn},
};

// ── Frames ───────────────────────────────────────────────────────────────────

/// Client → bridge action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCall {
    pub echo: String,
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// Bridge → client action result. `retcode == 0` is success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub echo: String,
    #[serde(default)]
    pub retcode: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wording: Option<String>,
}

impl ResponseFrame {
    pub fn is_ok(&self) -> bool {
        self.retcode == 0
    }

    /// Best available human-readable failure text.
    pub fn error_message(&self) -> String {
        [&self.message, &self.wording, &self.status]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| "unknown error".into())
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Response(ResponseFrame),
    Push(PushFrame),
}

// ── Codec ────────────────────────────────────────────────────────────────────

/// Fresh correlation token.
pub fn new_echo() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Encode a call with a fresh token. Returns `(echo, text)`.
pub fn encode(action: &str, params: Value) -> Result<(String, String)> {
    let echo = new_echo();
    let text = encode_with(&echo, action, params)?;
    Ok((echo, text))
}

/// Encode a call with a caller-supplied token.
pub fn encode_with(echo: &str, action: &str, params: Value) -> Result<String> {
    let call = OutboundCall {
        echo: echo.to_string(),
        action: action.to_string(),
        params,
    };
    Ok(serde_json::to_string(&call)?)
}

/// Decode an inbound text frame, reporting why it was rejected.
pub fn try_decode(text: &str) -> Result<WireFrame> {
    let mut value: Value = serde_json::from_str(text).map_err(Error::malformed)?;
    let Value::Object(map) = &mut value else {
        return Err(Error::malformed("frame is not a JSON object"));
    };

    match map.get("echo") {
        Some(Value::Null) | None => {},
        Some(echo) => {
            // Tokens are strings on our side; some bridges echo numbers back.
            if !echo.is_string() {
                let echo = echo.to_string();
                map.insert("echo".into(), Value::String(echo));
            }
            let response = serde_json::from_value(value).map_err(Error::malformed)?;
            return Ok(WireFrame::Response(response));
        },
    }

    if map.contains_key("post_type") {
        return PushFrame::from_value(value).map(WireFrame::Push);
    }

    Err(Error::malformed("frame has neither echo nor post_type"))
}

/// Decode an inbound text frame. Malformed input is logged and dropped so the
/// receive loop never sees an error.
pub fn decode(text: &str) -> Option<WireFrame> {
    match try_decode(text) {
        Ok(frame) => {
            trace!(frame = ?frame, "decoded frame");
            Some(frame)
        },
        Err(e) => {
            warn!(error = %e, bytes = text.len(), "dropping malformed frame");
            None
        },
    }
}
