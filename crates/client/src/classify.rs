use {
    crate::{
        Connection,
        event::{Event, MessageEvent, NoticeEvent, RequestEvent, SentMessageEvent},
    },
    onebridge_protocol::{PushFrame, notice},
    std::sync::Arc,
    tracing::{debug, trace},
};

/// Turn a push frame into a normalized event bound to `conn`.
pub fn classify(frame: PushFrame, conn: &Arc<Connection>) -> Event {
    match frame {
        PushFrame::Meta(meta) => {
            trace!(conn = %conn.label(), kind = %meta.meta_event_type, "meta event");
            Event::Meta(meta)
        },
        PushFrame::Message(message) => Event::Message(MessageEvent::new(message, Arc::clone(conn))),
        PushFrame::MessageSent(message) => Event::MessageSent(SentMessageEvent::new(message)),
        PushFrame::Notice(mut data) => {
            notice::normalize(&mut data);
            Event::Notice(NoticeEvent::new(data, Arc::clone(conn)))
        },
        PushFrame::Request(data) => Event::Request(RequestEvent::new(data, Arc::clone(conn))),
        PushFrame::Unrecognized { post_type, payload } => {
            debug!(conn = %conn.label(), post_type = %post_type, "forwarding unrecognized event");
            Event::Raw { post_type, payload }
        },
    }
}
