//! In-flight request deduplication.
//!
//! When identical requests overlap, only the first one reaches the transport;
//! the others join it and observe the same outcome. Entries are held weakly:
//! once every waiter has gone away the operation is dropped, its transport
//! token fires and its entry disappears.

use crate::{RequestFingerprint, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A pending request shared by every caller with the same fingerprint.
pub type SharedOperation = Shared<BoxFuture<'static, Result<Value>>>;

struct InFlight {
    id: u64,
    operation: WeakShared<BoxFuture<'static, Result<Value>>>,
}

/// Map from fingerprint to the request currently in flight for it.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: DashMap<RequestFingerprint, InFlight>,
    next_id: AtomicU64,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the operation in flight for `key`, or starts one.
    ///
    /// `start` receives the [`Settlement`] that the new operation must own for
    /// its whole life; dropping it removes the entry and cancels the
    /// settlement's token. The check and the insert happen under one shard
    /// lock, so overlapping callers never start two operations for one key.
    pub fn join_or_start<F>(self: &Arc<Self>, key: RequestFingerprint, start: F) -> SharedOperation
    where
        F: FnOnce(Settlement) -> BoxFuture<'static, Result<Value>>,
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(operation) = occupied.get().operation.upgrade() {
                    tracing::debug!(fingerprint = %key, "Joining in-flight request");
                    return operation;
                }
                let (operation, in_flight) = self.launch(key, start);
                if let Some(in_flight) = in_flight {
                    occupied.insert(in_flight);
                }
                operation
            }
            Entry::Vacant(vacant) => {
                let (operation, in_flight) = self.launch(key, start);
                if let Some(in_flight) = in_flight {
                    vacant.insert(in_flight);
                }
                operation
            }
        }
    }

    fn launch<F>(self: &Arc<Self>, key: RequestFingerprint, start: F) -> (SharedOperation, Option<InFlight>)
    where
        F: FnOnce(Settlement) -> BoxFuture<'static, Result<Value>>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let settlement = Settlement {
            registry: Arc::clone(self),
            key,
            id,
            cancel: CancellationToken::new(),
        };
        let operation = start(settlement).shared();
        let in_flight = operation
            .downgrade()
            .map(|operation| InFlight { id, operation });
        (operation, in_flight)
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ties a registry entry to the life of its operation.
pub struct Settlement {
    registry: Arc<InFlightRegistry>,
    key: RequestFingerprint,
    id: u64,
    cancel: CancellationToken,
}

impl Settlement {
    /// Token handed to the transport; fires when the operation settles or is
    /// abandoned.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The fingerprint this operation runs for.
    pub fn key(&self) -> &RequestFingerprint {
        &self.key
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        // A newer operation may already own the key.
        self.registry
            .entries
            .remove_if(&self.key, |_, in_flight| in_flight.id == self.id);
        self.cancel.cancel();
    }
}
