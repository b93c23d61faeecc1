//! Typed wrappers over the bridge's action vocabulary.

use {
    crate::{
        Connection, Result,
        facade::{FriendHandle, GroupHandle},
    },
    onebridge_protocol::{Sendable, actions},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    std::sync::Arc,
};

/// Result of `get_login_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
}

/// Result of the `send_*_msg` actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

impl Connection {
    pub fn group(self: &Arc<Self>, group_id: i64) -> GroupHandle {
        GroupHandle::new(group_id, Arc::clone(self))
    }

    pub fn friend(self: &Arc<Self>, user_id: i64) -> FriendHandle {
        FriendHandle::new(user_id, Arc::clone(self))
    }

    async fn unit(&self, action: &str, params: Value) -> Result<()> {
        self.call_raw(action, params).await.map(drop)
    }

    // ── Messages ─────────────────────────────────────────────────────────────

    pub async fn send_private_msg(
        &self,
        user_id: i64,
        content: impl Into<Sendable>,
    ) -> Result<SentMessage> {
        let message = content.into().into_wire();
        self.call(
            actions::SEND_PRIVATE_MSG,
            json!({ "user_id": user_id, "message": message }),
        )
        .await
    }

    pub async fn send_group_msg(
        &self,
        group_id: i64,
        content: impl Into<Sendable>,
    ) -> Result<SentMessage> {
        let message = content.into().into_wire();
        self.call(
            actions::SEND_GROUP_MSG,
            json!({ "group_id": group_id, "message": message }),
        )
        .await
    }

    pub async fn delete_msg(&self, message_id: i64) -> Result<()> {
        self.unit(actions::DELETE_MSG, json!({ "message_id": message_id }))
            .await
    }

    pub async fn get_msg(&self, message_id: i64) -> Result<Value> {
        self.call_raw(actions::GET_MSG, json!({ "message_id": message_id }))
            .await
    }

    /// Add (`set == true`) or remove an emoji reaction on a message.
    pub async fn set_msg_emoji_like(&self, message_id: i64, emoji_id: &str, set: bool) -> Result<()> {
        self.unit(
            actions::SET_MSG_EMOJI_LIKE,
            json!({ "message_id": message_id, "emoji_id": emoji_id, "set": set }),
        )
        .await
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    pub async fn set_group_ban(&self, group_id: i64, user_id: i64, duration_secs: u64) -> Result<()> {
        self.unit(
            actions::SET_GROUP_BAN,
            json!({ "group_id": group_id, "user_id": user_id, "duration": duration_secs }),
        )
        .await
    }

    pub async fn set_group_whole_ban(&self, group_id: i64, enable: bool) -> Result<()> {
        self.unit(
            actions::SET_GROUP_WHOLE_BAN,
            json!({ "group_id": group_id, "enable": enable }),
        )
        .await
    }

    pub async fn set_group_kick(
        &self,
        group_id: i64,
        user_id: i64,
        reject_add_request: bool,
    ) -> Result<()> {
        self.unit(
            actions::SET_GROUP_KICK,
            json!({
                "group_id": group_id,
                "user_id": user_id,
                "reject_add_request": reject_add_request,
            }),
        )
        .await
    }

    pub async fn set_group_card(&self, group_id: i64, user_id: i64, card: &str) -> Result<()> {
        self.unit(
            actions::SET_GROUP_CARD,
            json!({ "group_id": group_id, "user_id": user_id, "card": card }),
        )
        .await
    }

    pub async fn set_group_name(&self, group_id: i64, name: &str) -> Result<()> {
        self.unit(
            actions::SET_GROUP_NAME,
            json!({ "group_id": group_id, "group_name": name }),
        )
        .await
    }

    pub async fn set_essence_msg(&self, message_id: i64) -> Result<()> {
        self.unit(actions::SET_ESSENCE_MSG, json!({ "message_id": message_id }))
            .await
    }

    pub async fn delete_essence_msg(&self, message_id: i64) -> Result<()> {
        self.unit(
            actions::DELETE_ESSENCE_MSG,
            json!({ "message_id": message_id }),
        )
        .await
    }

    pub async fn get_group_list(&self) -> Result<Vec<Value>> {
        self.call(actions::GET_GROUP_LIST, json!({})).await
    }

    // ── Friends & requests ───────────────────────────────────────────────────

    pub async fn send_like(&self, user_id: i64, times: u32) -> Result<()> {
        self.unit(
            actions::SEND_LIKE,
            json!({ "user_id": user_id, "times": times }),
        )
        .await
    }

    pub async fn get_friend_list(&self) -> Result<Vec<Value>> {
        self.call(actions::GET_FRIEND_LIST, json!({})).await
    }

    pub async fn set_friend_add_request(
        &self,
        flag: &str,
        approve: bool,
        remark: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({ "flag": flag, "approve": approve });
        if let Some(remark) = remark {
            params["remark"] = Value::from(remark);
        }
        self.unit(actions::SET_FRIEND_ADD_REQUEST, params).await
    }

    pub async fn set_group_add_request(
        &self,
        flag: &str,
        sub_type: &str,
        approve: bool,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({ "flag": flag, "sub_type": sub_type, "approve": approve });
        if let Some(reason) = reason.filter(|_| !approve) {
            params["reason"] = Value::from(reason);
        }
        self.unit(actions::SET_GROUP_ADD_REQUEST, params).await
    }

    // ── Account ──────────────────────────────────────────────────────────────

    pub async fn get_login_info(&self) -> Result<LoginInfo> {
        self.call(actions::GET_LOGIN_INFO, json!({})).await
    }
}
