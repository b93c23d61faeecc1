use {
    crate::{Error, Result},
    onebridge_protocol::ResponseFrame,
    serde_json::Value,
    std::{
        collections::HashMap,
        sync::Mutex,
        time::{Duration, Instant},
    },
    tokio::sync::oneshot,
    tracing::debug,
};

struct PendingCall {
    action: String,
    created_at: Instant,
    tx: oneshot::Sender<Result<Value>>,
}

#[derive(Default)]
struct Table {
    calls: HashMap<String, PendingCall>,
    closed: bool,
}

/// Outstanding calls on one connection, keyed by echo token.
///
/// Every entry leaves the table exactly once: through [`resolve`] when its
/// response arrives, or through [`reject_all`] when the connection closes.
/// Once closed, the table refuses new registrations.
///
/// [`resolve`]: PendingCalls::resolve
/// [`reject_all`]: PendingCalls::reject_all
#[derive(Default)]
pub struct PendingCalls {
    inner: Mutex<Table>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call under `echo`.
    ///
    /// Returns `Ok(None)` when the token is already outstanding so the caller
    /// can pick another one, and `ConnectionClosed` once the table is closed.
    pub fn register(
        &self,
        echo: &str,
        action: &str,
    ) -> Result<Option<oneshot::Receiver<Result<Value>>>> {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if table.closed {
            return Err(Error::ConnectionClosed);
        }
        if table.calls.contains_key(echo) {
            return Ok(None);
        }
        let (tx, rx) = oneshot::channel();
        table.calls.insert(echo.to_string(), PendingCall {
            action: action.to_string(),
            created_at: Instant::now(),
            tx,
        });
        Ok(Some(rx))
    }

    /// Drop a registration whose frame never made it onto the wire.
    pub fn discard(&self, echo: &str) {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        table.calls.remove(echo);
    }

    /// Settle the call matching `frame.echo`. Returns `false` when no such
    /// call is outstanding (unknown token or already settled).
    pub fn resolve(&self, frame: ResponseFrame) -> bool {
        let entry = {
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            table.calls.remove(&frame.echo)
        };
        let Some(call) = entry else {
            debug!(echo = %frame.echo, "response for unknown or settled call");
            return false;
        };

        let outcome = if frame.is_ok() {
            Ok(frame.data)
        } else {
            Err(Error::remote(frame.retcode, frame.error_message()))
        };
        debug!(
            action = %call.action,
            retcode = frame.retcode,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            "call settled"
        );
        // The caller may have been dropped; nothing to do then.
        let _ = call.tx.send(outcome);
        true
    }

    /// Reject every outstanding call with `ConnectionClosed` and refuse new
    /// ones. Returns how many calls were rejected.
    pub fn reject_all(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            table.closed = true;
            table.calls.drain().map(|(_, call)| call).collect()
        };
        let count = drained.len();
        for call in drained {
            let _ = call.tx.send(Err(Error::ConnectionClosed));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, echo: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .contains_key(echo)
    }

    /// `(action, age)` for each outstanding call, oldest first. Calls have no
    /// timeout, so this is how stuck calls are spotted.
    pub fn snapshot(&self) -> Vec<(String, Duration)> {
        let table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut calls: Vec<(String, Duration)> = table
            .calls
            .values()
            .map(|c| (c.action.clone(), c.created_at.elapsed()))
            .collect();
        calls.sort_by(|a, b| b.1.cmp(&a.1));
        calls
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn response(echo: &str, retcode: i64, data: Value) -> ResponseFrame {
        ResponseFrame {
            echo: echo.into(),
            retcode,
            status: None,
            data,
            message: None,
            wording: None,
        }
    }

    #[tokio::test]
    async fn resolve_routes_to_caller_once() {
        let pending = PendingCalls::new();
        let rx = pending.register("t1", "get_login_info").unwrap().unwrap();

        assert!(pending.resolve(response("t1", 0, json!({ "user_id": 1 }))));
        assert!(pending.is_empty());
        // A second frame with the same token is ignored.
        assert!(!pending.resolve(response("t1", 0, json!({ "user_id": 2 }))));

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value["user_id"], 1);
    }

    #[tokio::test]
    async fn non_zero_retcode_is_remote_error() {
        let pending = PendingCalls::new();
        let rx = pending.register("t2", "send_group_msg").unwrap().unwrap();
        let mut frame = response("t2", 1400, Value::Null);
        frame.message = Some("not in group".into());
        pending.resolve(frame);

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Remote { code: 1400, ref message } if message == "not in group"));
    }

    #[test]
    fn duplicate_token_is_refused() {
        let pending = PendingCalls::new();
        let _rx = pending.register("same", "a").unwrap().unwrap();
        assert!(pending.register("same", "b").unwrap().is_none());
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn reject_all_settles_everything_and_closes() {
        let pending = PendingCalls::new();
        let rx1 = pending.register("a", "x").unwrap().unwrap();
        let rx2 = pending.register("b", "y").unwrap().unwrap();

        assert_eq!(pending.reject_all(), 2);
        assert!(pending.is_empty());
        assert!(matches!(rx1.await.unwrap(), Err(Error::ConnectionClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(Error::ConnectionClosed)));
        assert!(matches!(pending.register("c", "z"), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn snapshot_lists_actions() {
        let pending = PendingCalls::new();
        let _a = pending.register("a", "get_msg").unwrap();
        let snapshot = pending.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "get_msg");
    }
}
