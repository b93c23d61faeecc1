use {
    crate::{
        Error, Event, Result,
        actions::LoginInfo,
        bus::{EventBus, EventHandler, SubscriptionId},
        classify::classify,
        rpc::PendingCalls,
    },
    onebridge_protocol::{WireFrame, decode, encode_with, new_echo},
    serde::de::DeserializeOwned,
    serde_json::Value,
    std::{
        sync::{
            Arc, Mutex, OnceLock,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
    tokio::sync::{mpsc, watch},
    tracing::{debug, info, warn},
};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is up, identity not yet resolved.
    Connecting,
    Open,
    Closed,
}

/// Frame counters, reported by the status command.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub sent: AtomicU64,
    pub received: AtomicU64,
}

/// One physical session with a bridge endpoint.
///
/// Outbound frames go through an unbounded channel drained by the transport's
/// writer task; inbound text is fed to [`Connection::ingest`] by the reader.
pub struct Connection {
    label: String,
    identity: OnceLock<LoginInfo>,
    state: Mutex<ConnectionState>,
    outbound: mpsc::UnboundedSender<String>,
    closed: watch::Sender<bool>,
    pending: PendingCalls,
    bus: EventBus,
    stats: ConnectionStats,
    started_at: Instant,
}

impl Connection {
    /// Create a connection whose outbound frames are delivered to `outbound`.
    pub fn new(label: impl Into<String>, outbound: mpsc::UnboundedSender<String>) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            label: label.into(),
            identity: OnceLock::new(),
            state: Mutex::new(ConnectionState::Connecting),
            outbound,
            closed,
            pending: PendingCalls::new(),
            bus: EventBus::new(),
            stats: ConnectionStats::default(),
            started_at: Instant::now(),
        })
    }

    /// A connection with no transport: outbound frames land on the returned
    /// receiver and inbound frames are pushed with [`Connection::ingest`].
    pub fn in_memory(label: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(label, tx), rx)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolved account id. `None` until the handshake succeeds.
    pub fn self_id(&self) -> Option<i64> {
        self.identity.get().map(|i| i.user_id)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.identity.get().map(|i| i.nickname.as_str())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Outstanding calls as `(action, age)`, oldest first.
    pub fn pending_calls(&self) -> Vec<(String, Duration)> {
        self.pending.snapshot()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // ── Calls ────────────────────────────────────────────────────────────────

    /// Issue `action` and deserialize the response `data` into `T`.
    pub async fn call<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T> {
        let data = self.call_raw(action, params).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Issue `action` and return the raw response `data`.
    ///
    /// Fails with [`Error::NotConnected`] unless the connection is open. There
    /// is no timeout: the call settles when its response arrives or when the
    /// connection closes.
    pub async fn call_raw(&self, action: &str, params: Value) -> Result<Value> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        self.send_call(action, params).await
    }

    async fn send_call(&self, action: &str, params: Value) -> Result<Value> {
        let (echo, rx) = loop {
            let echo = new_echo();
            if let Some(rx) = self.pending.register(&echo, action)? {
                break (echo, rx);
            }
        };

        let text = match encode_with(&echo, action, params) {
            Ok(text) => text,
            Err(e) => {
                self.pending.discard(&echo);
                return Err(e.into());
            },
        };
        if self.outbound.send(text).is_err() {
            self.pending.discard(&echo);
            return Err(Error::ConnectionClosed);
        }
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        debug!(conn = %self.label, action, echo = %echo, "call sent");

        rx.await.unwrap_or(Err(Error::ConnectionClosed))
    }

    /// Resolve the account behind this connection with `get_login_info` and
    /// move to [`ConnectionState::Open`].
    pub async fn handshake(&self) -> Result<LoginInfo> {
        if self.state() == ConnectionState::Closed {
            return Err(Error::NotConnected);
        }
        let data = self
            .send_call(onebridge_protocol::actions::GET_LOGIN_INFO, Value::Object(Default::default()))
            .await?;
        let login: LoginInfo = serde_json::from_value(data)?;
        self.assume_identity(login.clone());
        Ok(login)
    }

    /// Record the resolved identity and open the connection. The identity is
    /// fixed once set.
    pub fn assume_identity(&self, login: LoginInfo) {
        if self.identity.set(login).is_err() {
            warn!(conn = %self.label, "identity already resolved, keeping the first one");
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// Process one inbound text frame. Responses settle their pending call
    /// and yield `None`; push frames are classified into an event.
    pub fn ingest(self: &Arc<Self>, text: &str) -> Option<Arc<Event>> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        match decode(text)? {
            WireFrame::Response(response) => {
                self.pending.resolve(response);
                None
            },
            WireFrame::Push(push) => Some(Arc::new(classify(push, self))),
        }
    }

    /// Run every handler subscribed to the event's paths.
    pub async fn dispatch(&self, event: Arc<Event>) {
        self.bus.emit(event).await;
    }

    /// [`ingest`](Self::ingest) then [`dispatch`](Self::dispatch).
    pub async fn handle_frame(self: &Arc<Self>, text: &str) {
        if let Some(event) = self.ingest(text) {
            self.dispatch(event).await;
        }
    }

    pub fn on(&self, path: impl Into<String>, handler: EventHandler) -> SubscriptionId {
        self.bus.on(path, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.bus.off(id)
    }

    pub fn handler_count(&self) -> usize {
        self.bus.handler_count()
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Close the connection: every outstanding call fails with
    /// [`Error::ConnectionClosed`] and later calls with [`Error::NotConnected`].
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }
        let rejected = self.pending.reject_all();
        self.closed.send_replace(true);
        info!(conn = %self.label, self_id = ?self.self_id(), rejected, "connection closed");
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.pending.reject_all();
    }
}
