//! Message segments.
//!
//! On the wire a message is an array of `{ "type": ..., "data": { ... } }`
//! objects. Inbound segments are flattened into [`Element`] records so
//! handlers can read `kind` and fields without walking the `data` envelope.

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::{Map, Value, json},
    tracing::debug,
};

/// One wire-level message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    Ok(Option::<Map<String, Value>>::deserialize(d)?.unwrap_or_default())
}

impl Segment {
    pub fn new(kind: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    fn with(kind: &str, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(kind, data)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with("text", json!({ "text": text.into() }))
    }

    pub fn at(user_id: i64) -> Self {
        Self::with("at", json!({ "qq": user_id.to_string() }))
    }

    pub fn at_all() -> Self {
        Self::with("at", json!({ "qq": "all" }))
    }

    /// Quote marker referencing an earlier message.
    pub fn reply(message_id: i64) -> Self {
        Self::with("reply", json!({ "id": message_id.to_string() }))
    }

    pub fn face(id: i64) -> Self {
        Self::with("face", json!({ "id": id.to_string() }))
    }

    /// Image by URL, local path (`file://`) or `base64://` payload.
    pub fn image(file: impl Into<String>) -> Self {
        Self::with("image", json!({ "file": file.into() }))
    }

    pub fn record(file: impl Into<String>) -> Self {
        Self::with("record", json!({ "file": file.into() }))
    }

    pub fn video(file: impl Into<String>) -> Self {
        Self::with("video", json!({ "file": file.into() }))
    }

    pub fn json(payload: impl Into<String>) -> Self {
        Self::with("json", json!({ "data": payload.into() }))
    }

    pub fn dice() -> Self {
        Self::with("dice", json!({}))
    }

    pub fn rps() -> Self {
        Self::with("rps", json!({}))
    }

    pub fn poke(user_id: i64) -> Self {
        Self::with("poke", json!({ "type": "1", "id": user_id.to_string() }))
    }

    /// Text payload if this is a `text` segment.
    pub fn as_text(&self) -> Option<&str> {
        (self.kind == "text")
            .then(|| self.data.get("text").and_then(Value::as_str))
            .flatten()
    }

    /// Flatten `{type, data:{...}}` into a single record.
    pub fn flatten(&self) -> Element {
        Element {
            kind: self.kind.clone(),
            fields: self.data.clone(),
        }
    }
}

/// A flattened inbound message element: `{ type, ...fields }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl Element {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Numeric field, accepting the string-encoded ids most bridges send.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl Serialize for Element {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut flat = self.fields.clone();
        flat.insert("type".into(), Value::String(self.kind.clone()));
        flat.serialize(serializer)
    }
}

/// Outbound message content. A plain string becomes a single text segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sendable(pub Vec<Segment>);

impl Sendable {
    /// Prepend a quote marker for `message_id`.
    #[must_use]
    pub fn quoting(mut self, message_id: i64) -> Self {
        self.0.insert(0, Segment::reply(message_id));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// No segments, or only empty text segments.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|s| s.as_text().is_some_and(str::is_empty))
    }

    /// Wire representation: `[{ "type": ..., "data": {...} }, ...]`.
    pub fn into_wire(self) -> Value {
        Value::Array(
            self.0
                .into_iter()
                .map(|s| json!({ "type": s.kind, "data": s.data }))
                .collect(),
        )
    }
}

impl From<&str> for Sendable {
    fn from(text: &str) -> Self {
        Self(vec![Segment::text(text)])
    }
}

impl From<String> for Sendable {
    fn from(text: String) -> Self {
        Self(vec![Segment::text(text)])
    }
}

impl From<&String> for Sendable {
    fn from(text: &String) -> Self {
        Self(vec![Segment::text(text.as_str())])
    }
}

impl From<Segment> for Sendable {
    fn from(segment: Segment) -> Self {
        Self(vec![segment])
    }
}

impl From<Vec<Segment>> for Sendable {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

/// Accept either a segment array or a raw string message body.
pub(crate) fn segments_or_text<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Segment>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(segment) => Some(segment),
                Err(e) => {
                    debug!(segment = %item, error = %e, "dropping unreadable segment");
                    None
                },
            })
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => vec![Segment::text(text)],
        _ => Vec::new(),
    })
}
