//! In-flight reservations: at most one job per key.
//!
//! The map holds, for every key with a running job, the receiving half of a
//! watch channel. Winning the vacant-entry insert makes the caller the owner;
//! everybody else clones the receiver and waits for the owner's
//! [`Reservation`] to be dropped.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mirror_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome published when a reservation is released. `None` means the owner
/// finished without populating, so waiters should look again.
type Outcome = Option<Result<()>>;

/// Single-flight reservation map shared by all requests.
#[derive(Clone, Default)]
pub struct InFlight {
    slots: Arc<DashMap<String, watch::Receiver<Outcome>>>,
}

/// Result of a non-blocking reservation attempt.
pub enum Acquire {
    /// The caller now owns the key.
    Owned(Reservation),
    /// Another job holds the key; the receiver fires when it is released.
    Busy(watch::Receiver<Outcome>),
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve `key` if nobody holds it.
    pub fn try_acquire(&self, key: &str) -> Acquire {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(slot) => Acquire::Busy(slot.get().clone()),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                Acquire::Owned(Reservation {
                    slots: self.slots.clone(),
                    key: key.to_string(),
                    tx,
                    outcome: None,
                })
            }
        }
    }

    /// Reserve `key`, waiting for any running job to finish first.
    ///
    /// Returns [`Error::Canceled`] as soon as `cancel` fires, without
    /// touching the running job. If the job that was waited on failed to
    /// populate, its error is returned instead of retrying.
    pub async fn acquire(&self, key: &str, cancel: &CancellationToken) -> Result<Reservation> {
        loop {
            let mut released = match self.try_acquire(key) {
                Acquire::Owned(reservation) => return Ok(reservation),
                Acquire::Busy(released) => released,
            };

            debug!("Waiting for in-flight job on {}", key);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Canceled),
                // Err means the owner went away without publishing; retry either way.
                _ = released.changed() => {}
            }

            let outcome = released.borrow().clone();
            if let Some(Err(err)) = outcome {
                return Err(err);
            }
        }
    }

    /// Number of keys currently reserved.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

/// Ownership of one key in the [`InFlight`] map.
///
/// Dropping it removes the key and wakes every waiter, so the key is
/// released exactly once on every exit path, unwinding included.
pub struct Reservation {
    slots: Arc<DashMap<String, watch::Receiver<Outcome>>>,
    key: String,
    tx: watch::Sender<Outcome>,
    outcome: Outcome,
}

impl Reservation {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the key and publish the populate outcome to waiters.
    pub fn complete(mut self, outcome: Result<()>) {
        self.outcome = Some(outcome);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        // Remove before publishing so a woken waiter finds the slot vacant.
        self.slots.remove(&self.key);
        if let Some(outcome) = self.outcome.take() {
            self.tx.send_replace(Some(outcome));
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn owned(acquire: Acquire) -> Reservation {
        match acquire {
            Acquire::Owned(reservation) => reservation,
            Acquire::Busy(_) => panic!("expected to own the key"),
        }
    }

    #[test]
    fn test_try_acquire_is_exclusive() {
        let in_flight = InFlight::new();
        let first = owned(in_flight.try_acquire("k"));
        assert!(matches!(in_flight.try_acquire("k"), Acquire::Busy(_)));
        assert!(matches!(in_flight.try_acquire("other"), Acquire::Owned(_)));
        assert_eq!(in_flight.len(), 1);

        drop(first);
        assert!(in_flight.is_empty());
        assert!(matches!(in_flight.try_acquire("k"), Acquire::Owned(_)));
    }

    #[tokio::test]
    async fn test_waiter_takes_over_after_release() {
        let in_flight = InFlight::new();
        let first = owned(in_flight.try_acquire("k"));

        let waiter = {
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                in_flight.acquire("k", &cancel).await.map(|r| r.key().to_string())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(first);

        let key = waiter.await.expect("join").expect("acquire");
        assert_eq!(key, "k");
    }

    #[tokio::test]
    async fn test_canceled_waiter_leaves_owner_alone() {
        let in_flight = InFlight::new();
        let _first = owned(in_flight.try_acquire("k"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = in_flight.acquire("k", &cancel).await;

        assert!(matches!(result, Err(Error::Canceled)));
        assert!(in_flight.contains("k"));
    }

    #[tokio::test]
    async fn test_failure_is_broadcast_to_waiters() {
        let in_flight = InFlight::new();
        let first = owned(in_flight.try_acquire("k"));

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    let cancel = CancellationToken::new();
                    in_flight.acquire("k", &cancel).await.map(|_| ())
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        first.complete(Err(Error::Store("bucket gone".into())));

        for waiter in waiters {
            let result = waiter.await.expect("join");
            assert!(matches!(result, Err(Error::Store(ref msg)) if msg == "bucket gone"));
        }
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_release_on_panic() {
        let in_flight = InFlight::new();
        let reservation = owned(in_flight.try_acquire("k"));

        let job = tokio::spawn(async move {
            let _reservation = reservation;
            panic!("populate blew up");
        });
        assert!(job.await.is_err());
        assert!(in_flight.is_empty());
    }
}
