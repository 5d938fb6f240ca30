//! In-process connections backed by unbounded channels.
//!
//! [`pair`] returns two connected ends. [`listener`] returns a
//! [`MemoryConnector`] whose every `connect` hands the far end of a fresh
//! pair to the matching [`MemoryTransport`], which plays the server role
//! through the ordinary [`Transport::accept`].

use std::sync::Mutex as StdMutex;

use tokio::sync::{Mutex, mpsc, watch};

use crate::{
    Connection, ConnectionId, Connector, Transport, TransportError,
    next_connection_id, wait_closed,
};

/// One end of an in-memory duplex link.
pub struct MemoryConnection {
    id: ConnectionId,
    endpoint: String,
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

impl MemoryConnection {
    fn new(
        endpoint: &str,
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: next_connection_id(),
            endpoint: endpoint.to_string(),
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
            closed,
        }
    }

    /// The endpoint string this link was opened for.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Creates two connected in-memory ends.
pub fn pair() -> (MemoryConnection, MemoryConnection) {
    pair_for("memory")
}

fn pair_for(endpoint: &str) -> (MemoryConnection, MemoryConnection) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        MemoryConnection::new(endpoint, a_tx, a_rx),
        MemoryConnection::new(endpoint, b_tx, b_rx),
    )
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("local end closed".into())
        })?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        let mut rx = self.rx.lock().await;
        tokio::select! {
            msg = rx.recv() => Ok(msg),
            () = wait_closed(&mut closed) => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        // Dropping the sender lets the peer's `recv` drain and return `None`.
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Client side of an in-memory listener.
#[derive(Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<MemoryConnection>,
}

/// Server side of an in-memory listener.
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
}

/// Creates a connector/transport pair sharing one accept queue.
pub fn listener() -> (MemoryConnector, MemoryTransport) {
    let (accepted, incoming) = mpsc::unbounded_channel();
    (MemoryConnector { accepted }, MemoryTransport { incoming })
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<MemoryConnection, TransportError> {
        let (client, server) = pair_for(endpoint);
        self.accepted.send(server).map_err(|_| {
            TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "memory listener dropped",
                ),
            }
        })?;
        tracing::debug!(id = %client.id(), endpoint, "memory link opened");
        Ok(client)
    }
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;

    async fn accept(&mut self) -> Result<MemoryConnection, TransportError> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.incoming.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_frames_both_ways() {
        let (a, b) = pair();
        a.send(b"ping").await.unwrap();
        assert_eq!(b.recv().await.unwrap().unwrap(), b"ping");
        b.send(b"pong").await.unwrap();
        assert_eq!(a.recv().await.unwrap().unwrap(), b"pong");
    }

    #[tokio::test]
    async fn test_close_wakes_parked_local_recv() {
        let (a, _b) = pair();
        let a = std::sync::Arc::new(a);
        let reader = {
            let a = std::sync::Arc::clone(&a);
            tokio::spawn(async move { a.recv().await })
        };
        tokio::task::yield_now().await;
        a.close().await.unwrap();
        assert!(reader.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = pair();
        a.send(b"last").await.unwrap();
        a.close().await.unwrap();
        assert_eq!(b.recv().await.unwrap().unwrap(), b"last");
        assert!(b.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = pair();
        a.close().await.unwrap();
        assert!(matches!(
            a.send(b"x").await,
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_listener_accepts_connected_client() {
        let (connector, mut transport) = listener();
        let client = connector.connect("wss://gateway").await.unwrap();
        let server = transport.accept().await.unwrap();
        assert_eq!(server.endpoint(), "wss://gateway");
        client.send(b"hello").await.unwrap();
        assert_eq!(server.recv().await.unwrap().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_accept_after_shutdown_reports_shutdown() {
        let (_connector, mut transport) = listener();
        transport.shutdown().await.unwrap();
        assert!(matches!(
            transport.accept().await,
            Err(TransportError::Shutdown)
        ));
    }
}
