//! WebSocket client transport using `tokio-tungstenite`.

use std::io;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    Connection, ConnectionId, Connector, TransportError, next_connection_id,
    wait_closed,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection;

    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<WebSocketConnection, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, e),
            })?;

        let id = next_connection_id();
        tracing::info!(%id, endpoint, "WebSocket connected");

        // Reader and writer halves are locked independently so the
        // dispatch loop can sit in `recv` while calls are being sent.
        let (sink, stream) = ws.split();
        let (closed, _) = watch::channel(false);
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed,
        })
    }
}

/// A single client-side WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        let mut stream = self.stream.lock().await;
        loop {
            let msg = tokio::select! {
                msg = stream.next() => msg,
                () = wait_closed(&mut closed) => return Ok(None),
            };
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
