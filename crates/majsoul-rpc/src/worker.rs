//! The notification worker: drains the queue fed by the dispatch loop.
//!
//! One worker per connection, one notification at a time, in arrival order.
//! A handler that errors or panics costs that one notification; the worker
//! logs it and moves on to the next.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use majsoul_protocol::Envelope;
use tokio::task::JoinHandle;

use crate::Notifications;

/// Consumes decoded notifications.
pub trait NotificationHandler: Send + 'static {
    type Error: Display + Send;

    fn handle(&mut self, envelope: Envelope) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Spawns a task feeding every notification from `queue` to `handler`.
///
/// The task ends when the queue closes (the dispatch loop exited) or when
/// it is aborted.
pub fn spawn_notification_worker<H: NotificationHandler>(
    mut queue: Notifications,
    mut handler: H,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = queue.recv().await {
            let method = envelope.method.clone();
            match AssertUnwindSafe(handler.handle(envelope)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(%method, error = %e, "notification handler failed");
                }
                Err(_) => {
                    tracing::error!(%method, "notification handler panicked");
                }
            }
        }
        tracing::debug!("notification worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use majsoul_protocol::MessageKind;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl NotificationHandler for Recorder {
        type Error = String;

        async fn handle(&mut self, envelope: Envelope) -> Result<(), String> {
            self.seen.lock().unwrap().push(envelope.method.clone());
            match envelope.method.as_str() {
                "boom" => panic!("handler blew up"),
                "fail" => Err("bad payload".into()),
                _ => Ok(()),
            }
        }
    }

    fn notify(method: &str) -> Envelope {
        Envelope {
            kind: MessageKind::Notify,
            index: None,
            method: method.into(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn test_worker_survives_errors_and_panics_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = spawn_notification_worker(
            rx,
            Recorder {
                seen: Arc::clone(&seen),
            },
        );

        for m in ["a", "fail", "boom", "b"] {
            tx.send(notify(m)).unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "fail", "boom", "b"]);
    }
}
