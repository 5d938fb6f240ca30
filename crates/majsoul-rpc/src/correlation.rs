//! The correlation table: outstanding request index → waiter.
//!
//! Callers insert, the dispatch loop resolves. Both happen from different
//! tasks, so the table sits behind a mutex. It's a `std` mutex because no
//! critical section awaits.
//!
//! Once the table is marked broken, every waiter has been failed and no new
//! waiter can be registered. The broken check and the insert happen under
//! the same lock, so a call can't slip in after the final sweep and hang.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::RpcError;

pub(crate) type Outcome = Result<Value, RpcError>;

#[derive(Default)]
struct State {
    broken: bool,
    waiters: HashMap<u16, oneshot::Sender<Outcome>>,
}

#[derive(Default)]
pub(crate) struct Correlation {
    state: Mutex<State>,
}

impl Correlation {
    /// Registers a waiter for `index`.
    pub(crate) fn register(&self, index: u16) -> Result<oneshot::Receiver<Outcome>, RpcError> {
        let mut state = self.lock();
        if state.broken {
            return Err(RpcError::ConnectionBroken);
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(index, tx);
        Ok(rx)
    }

    /// Resolves the waiter for `index`. Returns `false` if nobody was waiting.
    pub(crate) fn resolve(&self, index: u16, outcome: Outcome) -> bool {
        let Some(tx) = self.lock().waiters.remove(&index) else {
            return false;
        };
        // The caller may have given up (timeout, dropped future).
        tx.send(outcome).is_ok()
    }

    pub(crate) fn remove(&self, index: u16) {
        self.lock().waiters.remove(&index);
    }

    /// Marks the table broken and fails every outstanding waiter.
    pub(crate) fn fail_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.lock();
            state.broken = true;
            state.waiters.drain().collect()
        };
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(RpcError::ConnectionBroken));
        }
        count
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.lock().broken
    }

    pub(crate) fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_to_matching_waiter() {
        let table = Correlation::default();
        let a = table.register(1).unwrap();
        let b = table.register(2).unwrap();

        assert!(table.resolve(2, Ok(json!("two"))));
        assert!(table.resolve(1, Ok(json!("one"))));

        assert_eq!(a.await.unwrap().unwrap(), json!("one"));
        assert_eq!(b.await.unwrap().unwrap(), json!("two"));
    }

    #[test]
    fn test_resolve_unknown_index_returns_false() {
        let table = Correlation::default();
        assert!(!table.resolve(7, Ok(Value::Null)));
    }

    #[tokio::test]
    async fn test_fail_all_breaks_waiters_and_blocks_new_ones() {
        let table = Correlation::default();
        let rx = table.register(3).unwrap();

        assert_eq!(table.fail_all(), 1);
        assert!(matches!(rx.await.unwrap(), Err(RpcError::ConnectionBroken)));
        assert!(matches!(table.register(4), Err(RpcError::ConnectionBroken)));
        assert!(table.is_broken());
        assert_eq!(table.pending(), 0);
    }
}
