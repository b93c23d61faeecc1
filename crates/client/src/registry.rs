use {
    crate::{Connection, Error, Event, Result, ws},
    std::sync::{Arc, RwLock},
    tracing::{info, warn},
};

/// All live bridge connections, one per resolved account.
#[derive(Default)]
pub struct BotRegistry {
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `endpoint`, resolve its account and register it.
    pub async fn connect(&self, endpoint: &ws::Endpoint) -> Result<Arc<Connection>> {
        let conn = ws::open(endpoint).await?;
        self.admit(conn).await
    }

    /// Connect every endpoint, collecting failures instead of stopping at the
    /// first one.
    pub async fn connect_all(
        &self,
        endpoints: &[ws::Endpoint],
    ) -> (Vec<Arc<Connection>>, Vec<(String, Error)>) {
        let attempts = futures::future::join_all(endpoints.iter().map(|e| self.connect(e))).await;

        let mut connected = Vec::new();
        let mut failed = Vec::new();
        for (endpoint, attempt) in endpoints.iter().zip(attempts) {
            match attempt {
                Ok(conn) => connected.push(conn),
                Err(e) => {
                    warn!(endpoint = %endpoint.name, error = %e, "failed to connect");
                    failed.push((endpoint.name.clone(), e));
                },
            }
        }
        (connected, failed)
    }

    /// Handshake `conn` and add it to the active set.
    ///
    /// A connection resolving to an account that is already registered is
    /// closed and rejected with [`Error::DuplicateIdentity`].
    pub async fn admit(&self, conn: Arc<Connection>) -> Result<Arc<Connection>> {
        let login = match conn.handshake().await {
            Ok(login) => login,
            Err(e) => {
                conn.close();
                return Err(Error::handshake(conn.label(), e));
            },
        };

        {
            let mut connections = self.connections.write().unwrap_or_else(|e| e.into_inner());
            connections.retain(|c| c.is_open());
            if !connections.iter().any(|c| c.self_id() == Some(login.user_id)) {
                connections.push(Arc::clone(&conn));
                info!(
                    conn = %conn.label(),
                    self_id = login.user_id,
                    nickname = %login.nickname,
                    "bridge connection ready"
                );
                return Ok(conn);
            }
        }

        warn!(conn = %conn.label(), self_id = login.user_id, "duplicate account, closing");
        conn.close();
        Err(Error::DuplicateIdentity {
            self_id: login.user_id,
        })
    }

    /// Open connections in registration order.
    pub fn active(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.is_open())
            .cloned()
            .collect()
    }

    pub fn identities(&self) -> Vec<i64> {
        self.active().iter().filter_map(|c| c.self_id()).collect()
    }

    pub fn get(&self, self_id: i64) -> Option<Arc<Connection>> {
        self.active()
            .into_iter()
            .find(|c| c.self_id() == Some(self_id))
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn close_all(&self) {
        let drained: Vec<Arc<Connection>> = self
            .connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for conn in drained {
            conn.close();
        }
    }
}

/// Whether `event` should reach a handler registered on the connection
/// identified by `receiver`.
///
/// Events whose sender or operator is any of the `peers` accounts are
/// dropped so bridged bots never react to each other, and private messages
/// only pass on the connection they were addressed to.
pub fn should_deliver(event: &Event, receiver: i64, peers: &[i64]) -> bool {
    let from_peer = [event.user_id(), event.operator_id()]
        .into_iter()
        .flatten()
        .any(|actor| peers.contains(&actor));
    if from_peer {
        return false;
    }
    if event.is_private_message() {
        return event.self_id() == Some(receiver);
    }
    true
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        onebridge_protocol::OutboundCall,
        serde_json::{Value, json},
        tokio::sync::mpsc,
    };

    /// Answer the handshake on an in-memory connection with `self_id`.
    async fn admit_as(
        registry: &BotRegistry,
        label: &str,
        self_id: i64,
    ) -> (Result<Arc<Connection>>, Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (conn, mut rx) = Connection::in_memory(label);
        let responder = {
            let conn = Arc::clone(&conn);
            async move {
                let call: OutboundCall = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
                conn.ingest(
                    &json!({
                        "echo": call.echo,
                        "retcode": 0,
                        "data": { "user_id": self_id, "nickname": label }
                    })
                    .to_string(),
                );
                rx
            }
        };
        let (admitted, rx) = tokio::join!(registry.admit(Arc::clone(&conn)), responder);
        (admitted, conn, rx)
    }

    fn event(frame: Value) -> Event {
        let (conn, _rx) = Connection::in_memory("probe");
        let event = conn.ingest(&frame.to_string()).unwrap();
        (*event).clone()
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected_and_closed() {
        let registry = BotRegistry::new();
        let (first, ..) = admit_as(&registry, "a", 1001).await;
        assert!(first.is_ok());

        let (second, conn, _rx) = admit_as(&registry, "b", 1001).await;
        assert!(matches!(second, Err(Error::DuplicateIdentity { self_id: 1001 })));
        assert!(!conn.is_open());
        assert_eq!(registry.identities(), [1001]);
    }

    #[tokio::test]
    async fn closed_connections_leave_the_active_set() {
        let registry = BotRegistry::new();
        let (a, ..) = admit_as(&registry, "a", 1001).await;
        let (_b, ..) = admit_as(&registry, "b", 1002).await;
        assert_eq!(registry.len(), 2);

        a.unwrap().close();
        assert_eq!(registry.identities(), [1002]);
        assert!(registry.get(1001).is_none());

        registry.close_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn peer_sender_is_suppressed_everywhere() {
        let peers = [1001, 1002, 1003];
        let e = event(json!({
            "post_type": "message",
            "message_type": "group",
            "self_id": 1001,
            "user_id": 1002,
            "group_id": 9,
            "message": "hi"
        }));
        for receiver in peers {
            assert!(!should_deliver(&e, receiver, &peers));
        }
    }

    #[test]
    fn peer_operator_is_suppressed() {
        let e = event(json!({
            "post_type": "notice",
            "notice_type": "group_ban",
            "sub_type": "ban",
            "self_id": 1001,
            "group_id": 9,
            "user_id": 5,
            "operator_id": 1003,
            "duration": 60
        }));
        assert!(!should_deliver(&e, 1001, &[1001, 1003]));
        assert!(should_deliver(&e, 1001, &[1001, 1002]));
    }

    #[test]
    fn private_message_only_reaches_its_target() {
        let e = event(json!({
            "post_type": "message",
            "message_type": "private",
            "self_id": 1002,
            "user_id": 42,
            "message": "hi"
        }));
        let peers = [1001, 1002];
        assert!(!should_deliver(&e, 1001, &peers));
        assert!(should_deliver(&e, 1002, &peers));
    }
}
