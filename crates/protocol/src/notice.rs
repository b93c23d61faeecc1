//! Canonical notice vocabulary.
//!
//! Bridges report notices with an inconsistent mix of `notice_type` values
//! (`friend_recall`, `group_ban`, `notify` + `sub_type`, ...). Every notice is
//! rewritten into a `(notice_type, sub_type)` pair such as `group`/`ban`, with
//! the wire type kept in `original_notice_type`.

use crate::event::NoticePush;

/// Wire `notice_type` → canonical `(notice_type, sub_type)`.
const NOTICE_TYPE_MAP: &[(&str, &str, &str)] = &[
    ("friend_add", "friend", "increase"),
    ("friend_recall", "friend", "recall"),
    ("offline_file", "friend", "offline_file"),
    ("client_status", "client", "status"),
    ("group_admin", "group", "admin"),
    ("group_ban", "group", "ban"),
    ("group_card", "group", "card"),
    ("group_upload", "group", "upload"),
    ("group_decrease", "group", "decrease"),
    ("group_increase", "group", "increase"),
    ("group_msg_emoji_like", "group", "reaction"),
    ("essence", "group", "essence"),
    ("group_recall", "group", "recall"),
];

/// `notify` frames are keyed by their wire `sub_type` instead.
const NOTIFY_SUB_TYPE_MAP: &[(&str, &str, &str)] = &[
    ("input_status", "friend", "input"),
    ("profile_like", "friend", "like"),
    ("title", "group", "title"),
];

const NOTIFY: &str = "notify";
const POKE: &str = "poke";

/// Resolve the canonical pair for a wire notice. `None` means the wire
/// vocabulary is already canonical (or unknown) and is kept as is.
pub fn canonical(
    notice_type: &str,
    sub_type: Option<&str>,
    has_group: bool,
) -> Option<(&'static str, &'static str)> {
    if notice_type == NOTIFY {
        let sub_type = sub_type?;
        if sub_type == POKE {
            // The wire format does not say who was poked where; only the
            // presence of a group id tells the two apart.
            return Some(if has_group {
                ("group", POKE)
            } else {
                ("friend", POKE)
            });
        }
        return lookup(NOTIFY_SUB_TYPE_MAP, sub_type);
    }
    lookup(NOTICE_TYPE_MAP, notice_type)
}

fn lookup(
    table: &[(&str, &'static str, &'static str)],
    key: &str,
) -> Option<(&'static str, &'static str)> {
    table
        .iter()
        .find(|(wire, ..)| *wire == key)
        .map(|(_, notice_type, sub_type)| (*notice_type, *sub_type))
}

/// Rewrite `notice` in place into canonical vocabulary.
///
/// A wire `sub_type` displaced by the remap (e.g. `set`/`unset` on
/// `group_admin`, `ban`/`lift_ban` on `group_ban`) moves into `action_type`
/// unless the frame already carries one.
pub fn normalize(notice: &mut NoticePush) {
    if notice.original_notice_type.is_some() {
        return;
    }
    let wire_type = notice.notice_type.clone();
    let mapped = canonical(
        &wire_type,
        notice.sub_type.as_deref(),
        notice.group_id.is_some(),
    );

    if let Some((notice_type, sub_type)) = mapped {
        let displaced = notice.sub_type.take().filter(|s| s.as_str() != sub_type);
        if notice.action_type.is_none() && wire_type != NOTIFY {
            notice.action_type = displaced;
        }
        notice.notice_type = notice_type.to_string();
        notice.sub_type = Some(sub_type.to_string());
    }
    notice.original_notice_type = Some(wire_type);
}
