//! Typed push frames, one variant per primary category.

use {
    crate::{
        Error, Result, lenient,
        post_types::{MESSAGE, MESSAGE_SENT, META_EVENT, NOTICE, REQUEST},
        segment::{Segment, segments_or_text},
    },
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
};

/// A server-push frame classified by its `post_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum PushFrame {
    Meta(MetaPush),
    Message(MessagePush),
    /// Echo of a message the bot account itself sent.
    MessageSent(MessagePush),
    Notice(NoticePush),
    Request(RequestPush),
    /// A `post_type` this client does not know. Kept verbatim.
    Unrecognized { post_type: String, payload: Value },
}

impl PushFrame {
    /// Classify a decoded JSON object. Fails only when a known category is
    /// missing fields it cannot do without.
    pub fn from_value(value: Value) -> Result<Self> {
        let post_type = value
            .get("post_type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("push frame without post_type"))?
            .to_owned();

        let frame = match post_type.as_str() {
            META_EVENT => Self::Meta(parse(value, META_EVENT)?),
            MESSAGE => Self::Message(parse(value, MESSAGE)?),
            MESSAGE_SENT => Self::MessageSent(parse(value, MESSAGE_SENT)?),
            NOTICE => Self::Notice(parse(value, NOTICE)?),
            REQUEST => Self::Request(parse(value, REQUEST)?),
            _ => Self::Unrecognized {
                post_type,
                payload: value,
            },
        };
        Ok(frame)
    }

    pub fn post_type(&self) -> &str {
        match self {
            Self::Meta(_) => META_EVENT,
            Self::Message(_) => MESSAGE,
            Self::MessageSent(_) => MESSAGE_SENT,
            Self::Notice(_) => NOTICE,
            Self::Request(_) => REQUEST,
            Self::Unrecognized { post_type, .. } => post_type,
        }
    }

    pub fn self_id(&self) -> Option<i64> {
        match self {
            Self::Meta(m) => Some(m.self_id),
            Self::Message(m) | Self::MessageSent(m) => Some(m.self_id),
            Self::Notice(n) => Some(n.self_id),
            Self::Request(r) => Some(r.self_id),
            Self::Unrecognized { payload, .. } => payload.get("self_id").and_then(Value::as_i64),
        }
    }
}

fn parse<T: DeserializeOwned>(value: Value, category: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::malformed(format!("{category} frame: {e}")))
}

// ── Meta ─────────────────────────────────────────────────────────────────────

/// Lifecycle and heartbeat frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPush {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub self_id: i64,
    /// `heartbeat` or `lifecycle`.
    pub meta_event_type: String,
    /// `connect`, `enable` or `disable` for lifecycle frames.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Message ──────────────────────────────────────────────────────────────────

/// Sender profile attached to message frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: Option<String>,
    /// `owner`, `admin` or `member` in groups.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePush {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub self_id: i64,
    /// `private` or `group`.
    pub message_type: String,
    /// `friend`, `group`, `normal`, ...
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sub_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub message_id: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub group_name: Option<String>,
    /// Declared recipient of a private message.
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub target_id: Option<i64>,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default, deserialize_with = "segments_or_text")]
    pub message: Vec<Segment>,
    #[serde(default)]
    pub sender: Sender,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessagePush {
    pub fn is_group(&self) -> bool {
        self.message_type == "group"
    }

    /// Concatenated text of all `text` segments, trimmed.
    pub fn text(&self) -> String {
        self.message
            .iter()
            .filter_map(Segment::as_text)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

// ── Notice ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticePush {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub self_id: i64,
    pub notice_type: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sub_type: Option<String>,
    /// Wire `notice_type` before canonical remapping.
    #[serde(default)]
    pub original_notice_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub group_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub operator_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub target_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub message_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub duration: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoticePush {
    /// `action_type`, falling back to the `actions_type` spelling some builds use.
    pub fn action_kind(&self) -> Option<String> {
        self.action_type.clone().or_else(|| {
            self.extra.get("actions_type").and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        })
    }
}

// ── Request ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPush {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub self_id: i64,
    /// `friend` or `group`.
    pub request_type: String,
    /// `add` or `invite` for group requests.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sub_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub group_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub comment: String,
    /// Opaque token the bridge needs to answer the request.
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub flag: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
