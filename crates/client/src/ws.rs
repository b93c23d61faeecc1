//! WebSocket transport: one reader, one writer and one dispatcher task per
//! connection.

use {
    crate::{Connection, Error, Event, Result},
    futures::{SinkExt, StreamExt},
    secrecy::{ExposeSecret, Secret},
    std::sync::Arc,
    tokio::sync::mpsc,
    tokio_tungstenite::{
        connect_async,
        tungstenite::{
            Message,
            client::IntoClientRequest,
            http::{HeaderValue, header::AUTHORIZATION},
        },
    },
    tracing::{debug, info, warn},
};

/// Where and how to reach one bridge endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Label used in logs before the account id is known.
    pub name: String,
    /// `ws://host:port` or `wss://host:port`.
    pub url: String,
    pub access_token: Option<Secret<String>>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<Secret<String>>) -> Self {
        self.access_token = token.filter(|t| !t.expose_secret().is_empty());
        self
    }

    /// URL with the `access_token` query parameter appended when a token is set.
    pub fn request_url(&self) -> String {
        match &self.access_token {
            Some(token) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{sep}access_token={}", self.url, token.expose_secret())
            },
            None => self.url.clone(),
        }
    }
}

/// Open the transport and spawn its tasks. The returned connection is still
/// [`Connecting`](crate::ConnectionState::Connecting); the registry performs
/// the handshake.
pub async fn open(endpoint: &Endpoint) -> Result<Arc<Connection>> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut request = endpoint.request_url().into_client_request()?;
    if let Some(token) = &endpoint.access_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(Error::invalid_endpoint)?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    info!(endpoint = %endpoint.name, url = %endpoint.url, "connecting to bridge");
    let (ws_stream, _response) = connect_async(request).await?;
    let (sink, reader) = ws_stream.split();

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Arc<Event>>();
    let conn = Connection::new(endpoint.name.clone(), outbound_tx);

    tokio::spawn(dispatch_loop(Arc::clone(&conn), event_rx));
    tokio::spawn(socket_loop(Arc::clone(&conn), sink, reader, outbound_rx, event_tx));

    Ok(conn)
}

/// Run handlers strictly in arrival order, off the reader task so a handler
/// can await calls on its own connection.
async fn dispatch_loop(conn: Arc<Connection>, mut events: mpsc::UnboundedReceiver<Arc<Event>>) {
    while let Some(event) = events.recv().await {
        conn.dispatch(event).await;
    }
    debug!(conn = %conn.label(), "dispatcher stopped");
}

async fn socket_loop<S, R>(
    conn: Arc<Connection>,
    mut sink: S,
    mut reader: R,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<Arc<Event>>,
) where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    R: futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let outcome: Result<()> = async {
        loop {
            tokio::select! {
                msg = reader.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = conn.ingest(text.as_str()) {
                                let _ = events.send(event);
                            }
                        },
                        Some(Ok(Message::Ping(data))) => {
                            sink.send(Message::Pong(data)).await?;
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(conn = %conn.label(), "WebSocket closed by bridge");
                            return Ok(());
                        },
                        Some(Ok(_)) => {},
                        Some(Err(e)) => return Err(Error::WebSocket(e)),
                    }
                },
                text = outbound.recv() => {
                    match text {
                        Some(text) => sink.send(Message::Text(text.into())).await?,
                        None => return Ok(()),
                    }
                },
                () = conn.closed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                },
            }
        }
    }
    .await;

    if let Err(e) = outcome {
        warn!(conn = %conn.label(), error = %e, "connection error");
    }
    conn.close();
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_appended_as_query() {
        let endpoint = Endpoint::new("main", "ws://localhost:3333")
            .with_token(Some(Secret::new("abc".to_string())));
        assert_eq!(endpoint.request_url(), "ws://localhost:3333?access_token=abc");
    }

    #[test]
    fn empty_token_is_ignored() {
        let endpoint =
            Endpoint::new("main", "ws://localhost:3333/ws?x=1").with_token(Some(Secret::new(String::new())));
        assert!(endpoint.access_token.is_none());
        assert_eq!(endpoint.request_url(), "ws://localhost:3333/ws?x=1");
    }

    #[test]
    fn query_separator_respects_existing_query() {
        let endpoint = Endpoint::new("main", "wss://bridge.example/ws?x=1")
            .with_token(Some(Secret::new("t".to_string())));
        assert_eq!(endpoint.request_url(), "wss://bridge.example/ws?x=1&access_token=t");
    }
}
