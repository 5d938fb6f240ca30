//! One liqi connection: the read-dispatch loop and the call primitive.
//!
//! ```text
//!            call()                         dispatch loop (own task)
//!   encode ─→ register waiter ─→ send        recv ─→ decode ─┬─ RESPONSE → resolve waiter
//!                    ↑                                       ├─ NOTIFY   → notification queue
//!                    └──────── oneshot ◄─────────────────────┘  REQUEST  → logged
//! ```
//!
//! The loop never awaits anything but `recv`. Notifications are pushed onto
//! an unbounded queue so a slow consumer can't hold up responses to calls
//! in flight.

use std::sync::{Arc, Mutex};

use majsoul_protocol::{peek_header, Envelope, MessageCodec, MessageKind, ProtocolError};
use majsoul_transport::{Connection, ConnectionId};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::correlation::Correlation;
use crate::{RpcConfig, RpcError};

/// Decoded NOTIFY envelopes, in arrival order.
pub type Notifications = mpsc::UnboundedReceiver<Envelope>;

/// A correlated request/response channel over one [`Connection`].
///
/// Cheap to clone; all clones share the connection. When the last clone is
/// dropped the dispatch loop is stopped and any outstanding call fails with
/// [`RpcError::ConnectionBroken`].
pub struct RpcConnection<C: Connection> {
    inner: Arc<Inner<C>>,
}

impl<C: Connection> Clone for RpcConnection<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C: Connection> {
    conn: Arc<C>,
    codec: Arc<MessageCodec>,
    table: Arc<Correlation>,
    config: RpcConfig,
    dispatcher: Mutex<Option<AbortHandle>>,
}

impl<C: Connection> Drop for Inner<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
        self.table.fail_all();
    }
}

impl<C: Connection> RpcConnection<C> {
    /// Starts the dispatch loop over `conn`.
    ///
    /// Returns the connection handle and the queue of notifications. The
    /// queue closes when the dispatch loop exits.
    pub fn connect(conn: C, codec: Arc<MessageCodec>, config: RpcConfig) -> (Self, Notifications) {
        let conn = Arc::new(conn);
        let table = Arc::new(Correlation::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(dispatch_loop(
            Arc::clone(&conn),
            Arc::clone(&codec),
            Arc::clone(&table),
            notify_tx,
        ));

        let inner = Inner {
            conn,
            codec,
            table,
            config,
            dispatcher: Mutex::new(Some(task.abort_handle())),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            notify_rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.conn.id()
    }

    pub fn codec(&self) -> &Arc<MessageCodec> {
        &self.inner.codec
    }

    /// Whether the dispatch loop has exited.
    pub fn is_broken(&self) -> bool {
        self.inner.table.is_broken()
    }

    /// Number of calls waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.table.pending()
    }

    /// Sends a request for `method` and waits for its response payload.
    ///
    /// Any number of calls may be outstanding at once; each resolves with
    /// the response carrying its own index, whatever order they arrive in.
    ///
    /// # Errors
    /// - [`RpcError::ConnectionBroken`] if the dispatch loop has exited, or
    ///   exits before the response arrives
    /// - [`RpcError::Timeout`] if [`RpcConfig::call_timeout`] elapses
    /// - [`RpcError::Protocol`] if the payload doesn't fit the request type
    ///   or the response can't be decoded
    /// - [`RpcError::Transport`] if the frame can't be sent
    pub async fn call(&self, method: &str, payload: Value) -> Result<Value, RpcError> {
        let inner = &self.inner;
        if inner.table.is_broken() {
            return Err(RpcError::ConnectionBroken);
        }

        let (frame, index) = inner.codec.encode_request(method, &payload)?;
        let waiter = match inner.table.register(index) {
            Ok(rx) => rx,
            Err(e) => {
                inner.codec.forget(index);
                return Err(e);
            }
        };

        tracing::debug!(conn = %inner.conn.id(), index, method, "sending request");
        if let Err(e) = inner.conn.send(&frame).await {
            inner.table.remove(index);
            inner.codec.forget(index);
            return Err(e.into());
        }

        let outcome = match inner.config.call_timeout {
            Some(after) => match tokio::time::timeout(after, waiter).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    inner.table.remove(index);
                    inner.codec.forget(index);
                    tracing::warn!(index, method, ?after, "call timed out");
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        after,
                    });
                }
            },
            None => waiter.await,
        };

        // A dropped sender means the table was torn down under us.
        outcome.unwrap_or(Err(RpcError::ConnectionBroken))
    }

    /// Lightweight round-trip: a heartbeat call. `false` on any failure,
    /// including a non-zero error code.
    pub async fn check_alive(&self) -> bool {
        match self
            .call(
                majsoul_protocol::lobby::methods::HEARTBEAT,
                serde_json::json!({ "no_operation_counter": 0 }),
            )
            .await
        {
            Ok(payload) => majsoul_protocol::lobby::error_code(&payload) == 0,
            Err(e) => {
                tracing::debug!(error = %e, "liveness check failed");
                false
            }
        }
    }

    /// Closes the transport and fails every outstanding call.
    pub async fn close(&self) {
        if let Err(e) = self.inner.conn.close().await {
            tracing::debug!(error = %e, "close failed");
        }
        let handle = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        let failed = self.inner.table.fail_all();
        tracing::info!(conn = %self.inner.conn.id(), failed, "connection closed");
    }
}

async fn dispatch_loop<C: Connection>(
    conn: Arc<C>,
    codec: Arc<MessageCodec>,
    table: Arc<Correlation>,
    notify_tx: mpsc::UnboundedSender<Envelope>,
) {
    let conn_id = conn.id();
    tracing::debug!(conn = %conn_id, "dispatch loop started");

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(conn = %conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!(conn = %conn_id, error = %e, "receive failed");
                break;
            }
        };

        let envelope = match codec.decode_message(&frame) {
            Ok(env) => env,
            Err(ProtocolError::UnsolicitedResponse(index)) => {
                tracing::debug!(conn = %conn_id, index, "discarding unsolicited response");
                continue;
            }
            Err(e) => {
                // A response we can't decode still belongs to someone.
                if let Ok((MessageKind::Response, Some(index))) = peek_header(&frame) {
                    table.resolve(index, Err(RpcError::Protocol(e)));
                } else if e.is_schema_lookup() {
                    tracing::warn!(conn = %conn_id, error = %e, "unknown message");
                } else {
                    tracing::warn!(conn = %conn_id, error = %e, "malformed frame dropped");
                }
                continue;
            }
        };

        match envelope.kind {
            MessageKind::Response => {
                let index = envelope.index.unwrap_or_default();
                if !table.resolve(index, Ok(envelope.payload)) {
                    tracing::debug!(conn = %conn_id, index, "late response discarded");
                }
            }
            MessageKind::Notify => {
                tracing::debug!(conn = %conn_id, method = %envelope.method, "notification");
                if notify_tx.send(envelope).is_err() {
                    tracing::trace!(conn = %conn_id, "notification queue closed");
                }
            }
            MessageKind::Request => {
                tracing::info!(
                    conn = %conn_id,
                    method = %envelope.method,
                    payload = %envelope.payload,
                    "server-initiated request ignored"
                );
            }
        }
    }

    let failed = table.fail_all();
    if failed > 0 {
        tracing::warn!(conn = %conn_id, failed, "pending calls failed on disconnect");
    }
}
