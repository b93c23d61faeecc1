//! Group and friend facades: a connection plus the id needed to act.

use {
    crate::{Connection, Result, actions::SentMessage},
    onebridge_protocol::Sendable,
    std::sync::Arc,
};

#[derive(Clone)]
pub struct GroupHandle {
    pub group_id: i64,
    conn: Arc<Connection>,
}

impl GroupHandle {
    pub(crate) fn new(group_id: i64, conn: Arc<Connection>) -> Self {
        Self { group_id, conn }
    }

    pub async fn send(&self, content: impl Into<Sendable>) -> Result<SentMessage> {
        self.conn.send_group_msg(self.group_id, content).await
    }

    /// Mute `user_id` for `duration_secs`; zero lifts the mute.
    pub async fn ban(&self, user_id: i64, duration_secs: u64) -> Result<()> {
        self.conn
            .set_group_ban(self.group_id, user_id, duration_secs)
            .await
    }

    pub async fn unban(&self, user_id: i64) -> Result<()> {
        self.ban(user_id, 0).await
    }

    pub async fn mute_all(&self, enable: bool) -> Result<()> {
        self.conn.set_group_whole_ban(self.group_id, enable).await
    }

    pub async fn kick(&self, user_id: i64, reject_add_request: bool) -> Result<()> {
        self.conn
            .set_group_kick(self.group_id, user_id, reject_add_request)
            .await
    }

    pub async fn rename(&self, name: &str) -> Result<()> {
        self.conn.set_group_name(self.group_id, name).await
    }

    pub async fn set_card(&self, user_id: i64, card: &str) -> Result<()> {
        self.conn.set_group_card(self.group_id, user_id, card).await
    }

    pub async fn recall(&self, message_id: i64) -> Result<()> {
        self.conn.delete_msg(message_id).await
    }

    pub async fn set_essence(&self, message_id: i64) -> Result<()> {
        self.conn.set_essence_msg(message_id).await
    }

    pub async fn remove_essence(&self, message_id: i64) -> Result<()> {
        self.conn.delete_essence_msg(message_id).await
    }
}

#[derive(Clone)]
pub struct FriendHandle {
    pub user_id: i64,
    conn: Arc<Connection>,
}

impl FriendHandle {
    pub(crate) fn new(user_id: i64, conn: Arc<Connection>) -> Self {
        Self { user_id, conn }
    }

    pub async fn send(&self, content: impl Into<Sendable>) -> Result<SentMessage> {
        self.conn.send_private_msg(self.user_id, content).await
    }

    pub async fn like(&self, times: u32) -> Result<()> {
        self.conn.send_like(self.user_id, times).await
    }

    pub async fn recall(&self, message_id: i64) -> Result<()> {
        self.conn.delete_msg(message_id).await
    }
}
