//! Bridge WebSocket protocol definitions.
//!
//! All communication uses JSON text frames over a single WebSocket:
//! - [`OutboundCall`]: client → bridge action call, tagged with an `echo` token
//! - [`ResponseFrame`]: bridge → client action result, carrying the same `echo`
//! - [`PushFrame`]: bridge → client server-push, keyed by `post_type`

pub mod error;
pub mod event;
pub mod frame;
pub mod notice;
pub mod segment;

mod lenient;

pub use {
    error::{Error, Result},
    event::{MessagePush, MetaPush, NoticePush, PushFrame, RequestPush, Sender},
    frame::{
        OutboundCall, ResponseFrame, WireFrame, decode, encode, encode_with, new_echo, try_decode,
    },
    segment::{Element, Segment, Sendable},
};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3333;
pub const DEDUPE_MAX_ENTRIES: usize = 1_000;
pub const DEFAULT_PLUGIN_PRIORITY: i32 = 100;

// ── Post types ───────────────────────────────────────────────────────────────

pub mod post_types {
    pub const META_EVENT: &str = "meta_event";
    pub const MESSAGE: &str = "message";
    pub const MESSAGE_SENT: &str = "message_sent";
    pub const NOTICE: &str = "notice";
    pub const REQUEST: &str = "request";
}

// ── Action names ─────────────────────────────────────────────────────────────

pub mod actions {
    pub const GET_LOGIN_INFO: &str = "get_login_info";
    pub const GET_MSG: &str = "get_msg";
    pub const GET_FRIEND_LIST: &str = "get_friend_list";
    pub const GET_GROUP_LIST: &str = "get_group_list";
    pub const SEND_PRIVATE_MSG: &str = "send_private_msg";
    pub const SEND_GROUP_MSG: &str = "send_group_msg";
    pub const DELETE_MSG: &str = "delete_msg";
    pub const SET_MSG_EMOJI_LIKE: &str = "set_msg_emoji_like";
    pub const SET_GROUP_BAN: &str = "set_group_ban";
    pub const SET_GROUP_WHOLE_BAN: &str = "set_group_whole_ban";
    pub const SET_GROUP_KICK: &str = "set_group_kick";
    pub const SET_GROUP_CARD: &str = "set_group_card";
    pub const SET_GROUP_NAME: &str = "set_group_name";
    pub const SET_ESSENCE_MSG: &str = "set_essence_msg";
    pub const DELETE_ESSENCE_MSG: &str = "delete_essence_msg";
    pub const SEND_LIKE: &str = "send_like";
    pub const SET_FRIEND_ADD_REQUEST: &str = "set_friend_add_request";
    pub const SET_GROUP_ADD_REQUEST: &str = "set_group_add_request";
}
