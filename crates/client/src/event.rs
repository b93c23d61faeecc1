//! Normalized events and their bound actions.
//!
//! Each event carries its category path list (general first) and, where the
//! category has actions, a handle to the connection it arrived on so replies
//! and moderation go back through the same account.

use {
    crate::{
        Connection, Result,
        actions::SentMessage,
        facade::{FriendHandle, GroupHandle},
    },
    onebridge_protocol::{
        Element, MessagePush, MetaPush, NoticePush, RequestPush, Segment, Sendable,
        post_types::{MESSAGE, MESSAGE_SENT, META_EVENT, NOTICE, REQUEST},
    },
    serde_json::Value,
    std::{ops::Deref, sync::Arc},
};

/// A classified push frame.
#[derive(Clone)]
pub enum Event {
    Meta(MetaPush),
    Message(MessageEvent),
    MessageSent(SentMessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
    /// Unrecognized `post_type`, forwarded verbatim.
    Raw { post_type: String, payload: Value },
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("path", &self.path())
            .field("self_id", &self.self_id())
            .finish()
    }
}

/// `[root, root.a, root.a.b]` with empty components skipped.
fn hierarchy(root: &str, levels: &[Option<&str>]) -> Vec<String> {
    let mut paths = vec![root.to_string()];
    let mut current = root.to_string();
    for level in levels {
        let Some(level) = level.filter(|l| !l.is_empty()) else {
            break;
        };
        current = format!("{current}.{level}");
        paths.push(current.clone());
    }
    paths
}

impl Event {
    /// Category paths in emission order: general first, most specific last.
    pub fn paths(&self) -> Vec<String> {
        match self {
            Self::Meta(m) => hierarchy(META_EVENT, &[
                Some(m.meta_event_type.as_str()),
                m.sub_type.as_deref(),
            ]),
            Self::Message(m) => hierarchy(MESSAGE, &[
                Some(m.message_type.as_str()),
                m.sub_type.as_deref(),
            ]),
            Self::MessageSent(m) => hierarchy(MESSAGE_SENT, &[
                Some(m.message_type.as_str()),
                m.sub_type.as_deref(),
            ]),
            Self::Notice(n) => hierarchy(NOTICE, &[
                Some(n.notice_type.as_str()),
                n.sub_type.as_deref(),
            ]),
            Self::Request(r) => hierarchy(REQUEST, &[
                Some(r.request_type.as_str()),
                r.sub_type.as_deref(),
            ]),
            Self::Raw { post_type, .. } => vec![post_type.clone()],
        }
    }

    /// Most specific category path.
    pub fn path(&self) -> String {
        self.paths().pop().unwrap_or_default()
    }

    pub fn post_type(&self) -> &str {
        match self {
            Self::Meta(_) => META_EVENT,
            Self::Message(_) => MESSAGE,
            Self::MessageSent(_) => MESSAGE_SENT,
            Self::Notice(_) => NOTICE,
            Self::Request(_) => REQUEST,
            Self::Raw { post_type, .. } => post_type,
        }
    }

    pub fn self_id(&self) -> Option<i64> {
        match self {
            Self::Meta(m) => Some(m.self_id),
            Self::Message(m) => Some(m.self_id),
            Self::MessageSent(m) => Some(m.self_id),
            Self::Notice(n) => Some(n.self_id),
            Self::Request(r) => Some(r.self_id),
            Self::Raw { payload, .. } => raw_i64(payload, "self_id"),
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            Self::Meta(m) => m.time,
            Self::Message(m) => m.time,
            Self::MessageSent(m) => m.time,
            Self::Notice(n) => n.time,
            Self::Request(r) => r.time,
            Self::Raw { payload, .. } => raw_i64(payload, "time").unwrap_or_default(),
        }
    }

    /// Sender or subject of the event.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Meta(_) => None,
            Self::Message(m) => Some(m.user_id),
            Self::MessageSent(m) => Some(m.user_id),
            Self::Notice(n) => n.user_id,
            Self::Request(r) => Some(r.user_id),
            Self::Raw { payload, .. } => raw_i64(payload, "user_id"),
        }
    }

    pub fn operator_id(&self) -> Option<i64> {
        match self {
            Self::Notice(n) => n.operator_id,
            Self::Raw { payload, .. } => raw_i64(payload, "operator_id"),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            Self::Meta(_) => None,
            Self::Message(m) => m.group_id,
            Self::MessageSent(m) => m.group_id,
            Self::Notice(n) => n.group_id,
            Self::Request(r) => r.group_id,
            Self::Raw { payload, .. } => raw_i64(payload, "group_id"),
        }
    }

    pub fn is_private_message(&self) -> bool {
        matches!(self, Self::Message(m) if !m.is_group())
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_notice(&self) -> Option<&NoticeEvent> {
        match self {
            Self::Notice(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&RequestEvent> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }
}

fn raw_i64(payload: &Value, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ── Message ──────────────────────────────────────────────────────────────────

/// An inbound message with reply and moderation facades.
#[derive(Clone)]
pub struct MessageEvent {
    data: MessagePush,
    /// Flattened `{type, ...fields}` view of `data.message`.
    pub elements: Vec<Element>,
    conn: Arc<Connection>,
}

impl Deref for MessageEvent {
    type Target = MessagePush;

    fn deref(&self) -> &MessagePush {
        &self.data
    }
}

impl MessageEvent {
    pub(crate) fn new(data: MessagePush, conn: Arc<Connection>) -> Self {
        let elements = data.message.iter().map(Segment::flatten).collect();
        Self {
            data,
            elements,
            conn,
        }
    }

    pub fn data(&self) -> &MessagePush {
        &self.data
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Send `content` to the channel this message came from. With `quote`,
    /// a reply marker pointing at this message is prepended.
    pub async fn reply(&self, content: impl Into<Sendable>, quote: bool) -> Result<SentMessage> {
        let mut content = content.into();
        if quote {
            content = content.quoting(self.data.message_id);
        }
        match self.data.group_id.filter(|_| self.data.is_group()) {
            Some(group_id) => self.conn.send_group_msg(group_id, content).await,
            None => self.conn.send_private_msg(self.data.user_id, content).await,
        }
    }

    pub async fn recall(&self) -> Result<()> {
        self.conn.delete_msg(self.data.message_id).await
    }

    pub async fn add_reaction(&self, emoji_id: &str) -> Result<()> {
        self.conn
            .set_msg_emoji_like(self.data.message_id, emoji_id, true)
            .await
    }

    pub async fn remove_reaction(&self, emoji_id: &str) -> Result<()> {
        self.conn
            .set_msg_emoji_like(self.data.message_id, emoji_id, false)
            .await
    }

    pub async fn set_essence(&self) -> Result<()> {
        self.conn.set_essence_msg(self.data.message_id).await
    }

    pub async fn remove_essence(&self) -> Result<()> {
        self.conn.delete_essence_msg(self.data.message_id).await
    }

    /// Id of the message this one quotes, if any.
    pub fn quoted_id(&self) -> Option<i64> {
        self.elements
            .iter()
            .find(|e| e.kind == "reply")
            .and_then(|e| e.get_i64("id"))
    }

    /// Fetch the quoted message through `get_msg`.
    pub async fn quoted_message(&self) -> Result<Option<Value>> {
        match self.quoted_id() {
            Some(id) => self.conn.get_msg(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// The user this message points at: the first `@` target, or failing
    /// that the sender of the quoted message.
    pub async fn mentioned_user_id(&self) -> Result<Option<i64>> {
        let at = self
            .elements
            .iter()
            .filter(|e| e.kind == "at")
            .find_map(|e| e.get_i64("qq"))
            .filter(|id| *id != 0);
        if at.is_some() {
            return Ok(at);
        }
        Ok(self
            .quoted_message()
            .await?
            .and_then(|quoted| raw_i64(quoted.get("sender")?, "user_id"))
            .filter(|id| *id != 0))
    }

    /// React to this message with `emoji_id` while `work` runs, then take the
    /// reaction back.
    pub async fn with_reaction<T>(
        &self,
        emoji_id: &str,
        work: impl Future<Output = T>,
    ) -> Result<T> {
        self.add_reaction(emoji_id).await?;
        let output = work.await;
        self.remove_reaction(emoji_id).await?;
        Ok(output)
    }

    /// Facade for the group this message was posted in.
    pub fn group(&self) -> Option<GroupHandle> {
        self.data
            .group_id
            .filter(|_| self.data.is_group())
            .map(|id| self.conn.group(id))
    }

    /// Facade for the sender.
    pub fn friend(&self) -> FriendHandle {
        self.conn.friend(self.data.user_id)
    }
}

/// Echo of a message the account itself sent. No reply facade.
#[derive(Clone)]
pub struct SentMessageEvent {
    data: MessagePush,
    pub elements: Vec<Element>,
}

impl SentMessageEvent {
    pub(crate) fn new(data: MessagePush) -> Self {
        let elements = data.message.iter().map(Segment::flatten).collect();
        Self { data, elements }
    }
}

impl Deref for SentMessageEvent {
    type Target = MessagePush;

    fn deref(&self) -> &MessagePush {
        &self.data
    }
}

// ── Notice ───────────────────────────────────────────────────────────────────

/// A notice in canonical `(notice_type, sub_type)` vocabulary.
#[derive(Clone)]
pub struct NoticeEvent {
    data: NoticePush,
    conn: Arc<Connection>,
}

impl Deref for NoticeEvent {
    type Target = NoticePush;

    fn deref(&self) -> &NoticePush {
        &self.data
    }
}

impl NoticeEvent {
    pub(crate) fn new(data: NoticePush, conn: Arc<Connection>) -> Self {
        Self { data, conn }
    }

    pub fn data(&self) -> &NoticePush {
        &self.data
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn group(&self) -> Option<GroupHandle> {
        self.data.group_id.map(|id| self.conn.group(id))
    }

    pub fn friend(&self) -> Option<FriendHandle> {
        self.data.user_id.map(|id| self.conn.friend(id))
    }
}

// ── Request ──────────────────────────────────────────────────────────────────

/// A friend or group-join request bound to its opaque flag.
#[derive(Clone)]
pub struct RequestEvent {
    data: RequestPush,
    conn: Arc<Connection>,
}

impl Deref for RequestEvent {
    type Target = RequestPush;

    fn deref(&self) -> &RequestPush {
        &self.data
    }
}

impl RequestEvent {
    pub(crate) fn new(data: RequestPush, conn: Arc<Connection>) -> Self {
        Self { data, conn }
    }

    pub fn data(&self) -> &RequestPush {
        &self.data
    }

    pub fn is_group(&self) -> bool {
        self.data.request_type == "group"
    }

    pub async fn approve(&self) -> Result<()> {
        self.answer(true, None).await
    }

    /// Reject. `reason` is only transmitted for group requests.
    pub async fn reject(&self, reason: Option<&str>) -> Result<()> {
        self.answer(false, reason).await
    }

    async fn answer(&self, approve: bool, reason: Option<&str>) -> Result<()> {
        if self.is_group() {
            let sub_type = self.data.sub_type.as_deref().unwrap_or("add");
            self.conn
                .set_group_add_request(&self.data.flag, sub_type, approve, reason)
                .await
        } else {
            self.conn
                .set_friend_add_request(&self.data.flag, approve, None)
                .await
        }
    }
}
