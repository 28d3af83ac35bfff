//! One-shot delivery bridge
//!
//! Turns a push-style callback (which the OS may fire more than once, from any
//! thread) into a single awaited result. The first `deliver` resolves the
//! receiver; every later call is discarded, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

struct Slot<T> {
    delivered: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

/// Callback side. Cheap to clone into every callback that may fire.
pub struct DeliverySender<T> {
    slot: Arc<Slot<T>>,
}

/// Awaiting side. Resolves at most once.
pub struct DeliveryReceiver<T> {
    rx: oneshot::Receiver<T>,
}

/// Create a connected sender/receiver pair.
pub fn delivery<T>() -> (DeliverySender<T>, DeliveryReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    let sender = DeliverySender {
        slot: Arc::new(Slot {
            delivered: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
        }),
    };
    (sender, DeliveryReceiver { rx })
}

impl<T> Clone for DeliverySender<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> DeliverySender<T> {
    /// Resolve the receiver with `value`. Returns `false` when an earlier
    /// delivery already won or the receiver is gone.
    pub fn deliver(&self, value: T) -> bool {
        if self.slot.delivered.swap(true, Ordering::AcqRel) {
            return false;
        }
        let tx = self
            .slot
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.slot.delivered.load(Ordering::Acquire)
    }
}

impl<T> DeliveryReceiver<T> {
    /// Wait for the first delivery. `None` if every sender was dropped first.
    pub async fn recv(self) -> Option<T> {
        self.rx.await.ok()
    }

    /// Like [`recv`](Self::recv) but gives up after `limit`.
    pub async fn recv_timeout(self, limit: Duration) -> Option<T> {
        tokio::time::timeout(limit, self.rx).await.ok()?.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_delivery_wins() {
        let (tx, rx) = delivery();
        assert!(tx.deliver(1));
        assert!(!tx.deliver(2));
        assert!(tx.is_delivered());
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test]
    async fn test_later_deliveries_from_clones_are_discarded() {
        let (tx, rx) = delivery();
        let late = tx.clone();
        assert!(tx.deliver("frame-1"));
        assert!(!late.deliver("frame-2"));
        assert_eq!(rx.recv().await, Some("frame-1"));
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_resolve_once() {
        let (tx, rx) = delivery();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let tx = tx.clone();
                std::thread::spawn(move || tx.deliver(n))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_dropped_senders_resolve_none() {
        let (tx, rx) = delivery::<u8>();
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_recv_timeout_expires() {
        let (_tx, rx) = delivery::<u8>();
        assert_eq!(rx.recv_timeout(Duration::from_millis(20)).await, None);
    }

    #[tokio::test]
    async fn test_delivery_after_receiver_dropped_reports_false() {
        let (tx, rx) = delivery();
        drop(rx);
        assert!(!tx.deliver(7));
    }
}
