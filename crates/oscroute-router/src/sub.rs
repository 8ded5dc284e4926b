//! Single-route subscriptions
//!
//! A [`Sub`] owns an unbounded FIFO inbox. The route it was created from
//! keeps the sending half and pushes every published value list into it.
//! Unsubscribing enqueues a terminal marker behind anything already
//! delivered, so a consumer drains earlier values before its sequence ends.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{self, Stream};
use oscroute_core::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::route::Route;

static NEXT_SUB_ID: AtomicU64 = AtomicU64::new(1);

/// An item in a subscriber inbox
#[derive(Debug)]
pub(crate) enum Delivery {
    Values(Vec<Value>),
    /// Ends the consumer's sequence
    Unsubscribed,
}

/// The half of a subscription held by its route
#[derive(Debug)]
pub(crate) struct SubShared {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
    active: AtomicBool,
}

impl SubShared {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Enqueue values; false once the subscription has ended
    pub(crate) fn deliver(&self, values: Vec<Value>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.tx.send(Delivery::Values(values)).is_ok()
    }

    /// Move to the terminal state and enqueue the marker, once
    pub(crate) fn terminate(&self) -> bool {
        if self.active.swap(false, Ordering::SeqCst) {
            let _ = self.tx.send(Delivery::Unsubscribed);
            true
        } else {
            false
        }
    }
}

struct Inbox {
    rx: mpsc::UnboundedReceiver<Delivery>,
    done: bool,
}

/// A subscriber to one route
///
/// Clones share the same inbox; each value is observed by exactly one
/// reader.
#[derive(Clone)]
pub struct Sub {
    shared: Arc<SubShared>,
    route: Route,
    inbox: Arc<Mutex<Inbox>>,
}

impl Sub {
    pub(crate) fn new(route: Route) -> (Self, Arc<SubShared>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SubShared {
            id: NEXT_SUB_ID.fetch_add(1, Ordering::Relaxed),
            tx,
            active: AtomicBool::new(true),
        });
        let sub = Self {
            shared: shared.clone(),
            route,
            inbox: Arc::new(Mutex::new(Inbox { rx, done: false })),
        };
        (sub, shared)
    }

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub(crate) fn shared(&self) -> &Arc<SubShared> {
        &self.shared
    }

    /// False once unsubscribed, even if values are still queued
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Wait for the next published value list.
    ///
    /// Returns `None` once the unsubscribe marker is reached, and on every
    /// call after that.
    pub async fn next(&self) -> Option<Vec<Value>> {
        let mut inbox = self.inbox.lock().await;
        if inbox.done {
            return None;
        }
        debug!("{}: waiting for next item", self);
        match inbox.rx.recv().await {
            Some(Delivery::Values(values)) => {
                debug!("{}: got {:?}", self, values);
                Some(values)
            }
            Some(Delivery::Unsubscribed) | None => {
                debug!("{}: unsubscribed", self);
                inbox.done = true;
                None
            }
        }
    }

    /// The received value lists as a stream
    pub fn stream(&self) -> impl Stream<Item = Vec<Value>> + Send + 'static {
        stream::unfold(self.clone(), |sub| async move {
            let values = sub.next().await?;
            Some((values, sub))
        })
    }

    /// Deliver straight into this subscriber's inbox
    pub fn publish_nowait(&self, values: Vec<Value>) -> bool {
        self.shared.deliver(values)
    }

    /// Deliver, then give the consumer a chance to run
    pub async fn publish(&self, values: Vec<Value>) -> bool {
        let delivered = self.publish_nowait(values);
        tokio::task::yield_now().await;
        delivered
    }

    /// Detach from the route and end the sequence after queued values.
    ///
    /// Returns false if already unsubscribed.
    pub fn unsubscribe(&self) -> bool {
        self.route.unsub(self)
    }
}

impl PartialEq for Sub {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Sub {}

impl Hash for Sub {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Sub {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sub {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Debug for Sub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sub")
            .field("id", &self.id())
            .field("route", &self.route)
            .field("active", &self.is_active())
            .finish()
    }
}

impl fmt::Display for Sub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub#{}({})", self.id(), self.route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use oscroute_core::args;
    use std::time::Duration;

    fn route() -> Route {
        Route::parse("/foo", "i").unwrap()
    }

    #[tokio::test]
    async fn test_fifo_then_terminate() {
        let route = route();
        let sub = route.sub();
        sub.publish_nowait(args![1]);
        sub.publish_nowait(args![2]);
        assert!(sub.unsubscribe());
        assert!(!sub.publish_nowait(args![3]));

        assert_eq!(sub.next().await, Some(args![1]));
        assert_eq!(sub.next().await, Some(args![2]));
        assert_eq!(sub.next().await, None);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_wakes_waiting_reader() {
        let sub = route().sub();
        let reader = {
            let sub = sub.clone();
            tokio::spawn(async move { sub.next().await })
        };
        tokio::task::yield_now().await;
        sub.unsubscribe();
        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice() {
        let sub = route().sub();
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_stream() {
        let sub = route().sub();
        for i in 0..3 {
            sub.publish_nowait(args![i]);
        }
        sub.unsubscribe();
        let items: Vec<_> = sub.stream().collect().await;
        assert_eq!(items, vec![args![0], args![1], args![2]]);
    }

    #[test]
    fn test_identity() {
        let route = route();
        let a = route.sub();
        let b = route.sub();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a < b);
    }
}
