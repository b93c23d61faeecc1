//! Client side of a OneBot-style bridge.
//!
//! A [`Connection`] multiplexes action calls (correlated by `echo` token) and
//! server-push events over one WebSocket. Push frames are classified into
//! [`Event`]s with hierarchical category paths (`notice`, `notice.group`,
//! `notice.group.ban`) and delivered in arrival order to handlers on the
//! connection's bus. [`BotRegistry`] owns every live connection, one per
//! resolved account.

pub mod actions;
pub mod bus;
pub mod classify;
pub mod connection;
pub mod error;
pub mod event;
pub mod facade;
pub mod registry;
pub mod rpc;
pub mod ws;

pub use {
    actions::{LoginInfo, SentMessage},
    bus::{EventBus, EventHandler, SubscriptionId, event_handler},
    connection::{Connection, ConnectionState, ConnectionStats},
    error::{Error, Result},
    event::{Event, MessageEvent, NoticeEvent, RequestEvent, SentMessageEvent},
    facade::{FriendHandle, GroupHandle},
    registry::{BotRegistry, should_deliver},
    ws::Endpoint,
};
