//! Cross-connection event deduplication.
//!
//! Several bot accounts in the same group each receive a copy of every group
//! message and notice. A handler registered through the plugin host should
//! react once, so each loggable event gets a stable key built from its
//! content rather than from the receiving connection.

use {
    onebridge_client::Event,
    onebridge_protocol::DEDUPE_MAX_ENTRIES,
    sha2::{Digest, Sha256},
    std::{
        collections::{HashSet, VecDeque},
        fmt::Display,
        sync::Mutex,
    },
};

/// Bounded "already handled" set with FIFO eviction.
pub struct Deduplicator {
    capacity: usize,
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    members: HashSet<String>,
    order: VecDeque<String>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::with_capacity(DEDUPE_MAX_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            store: Mutex::new(Store::default()),
        }
    }

    /// Content key for `event`, or `None` for categories that are never
    /// deduplicated.
    pub fn key(event: &Event) -> Option<String> {
        match event {
            Event::Message(m) if m.is_group() => {
                let content = if m.raw_message.is_empty() {
                    serde_json::to_string(&m.message).unwrap_or_default()
                } else {
                    m.raw_message.clone()
                };
                Some(format!(
                    "msg:group:{}:{}:{}:{}",
                    opt(m.group_id),
                    m.user_id,
                    m.time,
                    digest(&content)
                ))
            },
            Event::Notice(n) if n.notice_type == "group" => {
                let sub = n.sub_type.as_deref().unwrap_or_default();
                Some(format!(
                    "notice:group:{sub}:{}:{}:{}:{}:{sub}:{}:{}:{}",
                    opt(n.group_id),
                    opt(n.user_id),
                    opt(n.operator_id),
                    opt(n.target_id),
                    n.action_kind().unwrap_or_default(),
                    opt(n.duration),
                    n.time
                ))
            },
            Event::Request(r) => {
                let head = if r.is_group() {
                    format!("req:group:{}", r.sub_type.as_deref().unwrap_or_default())
                } else {
                    "req:friend".to_string()
                };
                let comment = if r.comment.is_empty() {
                    String::new()
                } else {
                    digest(&r.comment)
                };
                Some(format!(
                    "{head}:{}:{}:{}:{comment}",
                    r.user_id,
                    opt(r.group_id),
                    r.time
                ))
            },
            _ => None,
        }
    }

    fn scoped(event: &Event, scope: &str) -> Option<String> {
        Self::key(event).map(|key| format!("{key}:{scope}"))
    }

    /// Whether `event` was already marked under `scope`. Events without a key
    /// are never processed.
    pub fn is_processed(&self, event: &Event, scope: &str) -> bool {
        let Some(key) = Self::scoped(event, scope) else {
            return false;
        };
        self.lock().members.contains(&key)
    }

    pub fn mark_processed(&self, event: &Event, scope: &str) {
        if let Some(key) = Self::scoped(event, scope) {
            self.insert(key);
        }
    }

    /// Mark `event` and report whether it is new, in one critical section.
    ///
    /// Returns `true` for events without a key.
    pub fn check_and_mark(&self, event: &Event, scope: &str) -> bool {
        match Self::scoped(event, scope) {
            Some(key) => self.insert(key),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut store = self.lock();
        store.members.clear();
        store.order.clear();
    }

    /// Returns `false` if `key` was already present.
    fn insert(&self, key: String) -> bool {
        let mut store = self.lock();
        if store.members.contains(&key) {
            return false;
        }
        while store.order.len() >= self.capacity {
            if let Some(oldest) = store.order.pop_front() {
                store.members.remove(&oldest);
            }
        }
        store.members.insert(key.clone());
        store.order.push_back(key);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn opt(value: Option<impl Display>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn digest(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
