//! Joined subscriptions
//!
//! [`Subs`] is a set of [`Sub`]s, built with `|`. Its [`SubsStream`] merges
//! the members into one stream of `(route, values)` pairs: each member
//! always has one read in flight, the first to finish is yielded and that
//! member is re-armed. A member that unsubscribes drops out of the merge;
//! the merge ends when no members remain.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{join_all, AbortHandle, Abortable, Aborted, BoxFuture, FutureExt};
use futures::stream::{FusedStream, FuturesUnordered, Stream, StreamExt};
use futures::task::noop_waker_ref;
use oscroute_core::Value;
use tracing::debug;

use crate::route::Route;
use crate::sub::Sub;

/// A set of subscribers
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Subs {
    members: BTreeSet<Sub>,
}

impl Subs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sub> {
        self.members.iter()
    }

    /// Add a member; false if it was already present
    pub fn insert(&mut self, sub: Sub) -> bool {
        self.members.insert(sub)
    }

    pub fn remove(&mut self, sub: &Sub) -> bool {
        self.members.remove(sub)
    }

    /// Add a fresh subscriber of `route` and return it
    pub fn subscribe(&mut self, route: &Route) -> Sub {
        let sub = route.sub();
        self.members.insert(sub.clone());
        sub
    }

    /// Whether any member subscribes to a route equal to `route`
    pub fn contains_route(&self, route: &Route) -> bool {
        self.members.iter().any(|s| s.route() == route)
    }

    pub fn contains_sub(&self, sub: &Sub) -> bool {
        self.members.contains(sub)
    }

    pub fn is_superset(&self, other: &Subs) -> bool {
        self.members.is_superset(&other.members)
    }

    /// Distinct routes of the members
    pub fn routes(&self) -> BTreeSet<Route> {
        self.members.iter().map(|s| s.route().clone()).collect()
    }

    /// Enqueue values on every member; returns how many accepted them
    pub fn publish_nowait(&self, values: Vec<Value>) -> usize {
        self.members
            .iter()
            .filter(|s| s.publish_nowait(values.clone()))
            .count()
    }

    /// Publish to every member concurrently
    pub async fn publish(&self, values: Vec<Value>) -> usize {
        join_all(self.members.iter().map(|s| s.publish(values.clone())))
            .await
            .into_iter()
            .filter(|delivered| *delivered)
            .count()
    }

    /// Unsubscribe every member; returns how many were still active
    pub fn unsubscribe(&self) -> usize {
        self.members.iter().filter(|s| s.unsubscribe()).count()
    }

    /// Merge the members into one stream
    pub fn stream(&self) -> SubsStream {
        let mut stream = SubsStream::new();
        for sub in &self.members {
            stream.attach(sub.clone());
        }
        stream
    }
}

impl fmt::Debug for Subs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.members.iter()).finish()
    }
}

impl From<Sub> for Subs {
    fn from(sub: Sub) -> Self {
        let mut subs = Subs::new();
        subs.insert(sub);
        subs
    }
}

impl FromIterator<Sub> for Subs {
    fn from_iter<I: IntoIterator<Item = Sub>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl Extend<Sub> for Subs {
    fn extend<I: IntoIterator<Item = Sub>>(&mut self, iter: I) {
        self.members.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Subs {
    type Item = &'a Sub;
    type IntoIter = std::collections::btree_set::Iter<'a, Sub>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl BitOr for Sub {
    type Output = Subs;

    fn bitor(self, rhs: Sub) -> Subs {
        Subs::from_iter([self, rhs])
    }
}

impl BitOr<Subs> for Sub {
    type Output = Subs;

    fn bitor(self, mut rhs: Subs) -> Subs {
        rhs.insert(self);
        rhs
    }
}

impl BitOr<Sub> for Subs {
    type Output = Subs;

    fn bitor(mut self, rhs: Sub) -> Subs {
        self.insert(rhs);
        self
    }
}

impl BitOr for Subs {
    type Output = Subs;

    fn bitor(mut self, rhs: Subs) -> Subs {
        self.members.extend(rhs.members);
        self
    }
}

impl BitOr<&Route> for Subs {
    type Output = Subs;

    fn bitor(mut self, rhs: &Route) -> Subs {
        self.subscribe(rhs);
        self
    }
}

impl BitOrAssign<Sub> for Subs {
    fn bitor_assign(&mut self, rhs: Sub) {
        self.insert(rhs);
    }
}

impl BitOrAssign for Subs {
    fn bitor_assign(&mut self, rhs: Subs) {
        self.members.extend(rhs.members);
    }
}

impl BitOrAssign<&Route> for Subs {
    fn bitor_assign(&mut self, rhs: &Route) {
        self.subscribe(rhs);
    }
}

type Read = (Sub, Option<Vec<Value>>);
type Armed = BoxFuture<'static, (u64, Result<Read, Aborted>)>;

/// Fair merge over a changing set of subscribers
pub struct SubsStream {
    pending: FuturesUnordered<Armed>,
    reads: HashMap<u64, AbortHandle>,
    ready: VecDeque<(Route, Vec<Value>)>,
}

impl SubsStream {
    pub fn new() -> Self {
        Self {
            pending: FuturesUnordered::new(),
            reads: HashMap::new(),
            ready: VecDeque::new(),
        }
    }

    /// Members still being read
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn contains(&self, sub: &Sub) -> bool {
        self.reads.contains_key(&sub.id())
    }

    /// Add a member to the running merge; false if already present
    pub fn attach(&mut self, sub: Sub) -> bool {
        if self.contains(&sub) {
            return false;
        }
        self.arm(sub);
        true
    }

    /// Drop a member, cancelling its in-flight read.
    ///
    /// The read is dropped before this returns, so the member's inbox is
    /// free for `Sub::next` right away. Values the member had not yet
    /// yielded stay in its inbox.
    pub fn detach(&mut self, sub: &Sub) -> bool {
        match self.reads.remove(&sub.id()) {
            Some(handle) => {
                handle.abort();
                self.reap(sub.id());
                true
            }
            None => false,
        }
    }

    fn arm(&mut self, sub: Sub) {
        let (handle, registration) = AbortHandle::new_pair();
        let id = sub.id();
        self.reads.insert(id, handle);
        let read = async move {
            let values = sub.next().await;
            (sub, values)
        };
        self.pending
            .push(Abortable::new(read, registration).map(move |r| (id, r)).boxed());
    }

    /// Poll until the aborted read of `id` is released.
    ///
    /// Reads that finish meanwhile are queued for `poll_next`; their members
    /// are re-armed once the aborted read is gone.
    fn reap(&mut self, id: u64) {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut rearm = Vec::new();
        let mut retries = self.pending.len() + 1;
        while retries > 0 {
            match self.pending.poll_next_unpin(&mut cx) {
                Poll::Ready(None) => break,
                Poll::Ready(Some((done, Err(Aborted)))) => {
                    if done == id {
                        break;
                    }
                }
                Poll::Ready(Some((_, Ok((sub, Some(values)))))) => {
                    self.ready.push_back((sub.route().clone(), values));
                    rearm.push(sub);
                }
                Poll::Ready(Some((_, Ok((sub, None))))) => {
                    debug!("{}: left merged stream", sub);
                    self.reads.remove(&sub.id());
                }
                // Yielded before reaching the aborted read
                Poll::Pending => retries -= 1,
            }
        }
        for sub in rearm {
            self.arm(sub);
        }
    }
}

impl Default for SubsStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for SubsStream {
    type Item = (Route, Vec<Value>);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = self.ready.pop_front() {
            return Poll::Ready(Some(item));
        }
        loop {
            match self.pending.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                // Detached member
                Poll::Ready(Some((_, Err(Aborted)))) => continue,
                Poll::Ready(Some((_, Ok((sub, Some(values)))))) => {
                    let route = sub.route().clone();
                    self.arm(sub);
                    return Poll::Ready(Some((route, values)));
                }
                Poll::Ready(Some((_, Ok((sub, None))))) => {
                    debug!("{}: left merged stream", sub);
                    self.reads.remove(&sub.id());
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let queued = self.ready.len();
        (queued, if self.reads.is_empty() { Some(queued) } else { None })
    }
}

impl FusedStream for SubsStream {
    fn is_terminated(&self) -> bool {
        self.reads.is_empty() && self.pending.is_empty() && self.ready.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscroute_core::args;
    use std::time::Duration;
    use tokio::time::timeout;

    fn routes() -> (Route, Route) {
        (
            Route::parse("/foo", "i").unwrap(),
            Route::parse("/bar", "i").unwrap(),
        )
    }

    #[test]
    fn test_set_algebra() {
        let (foo, bar) = routes();
        let a = foo.sub();
        let b = bar.sub();
        let ab = a.clone() | b.clone();
        assert_eq!(ab.len(), 2);
        assert!(ab.contains_sub(&a));
        assert!(ab.contains_route(&bar));
        assert!(ab.is_superset(&Subs::from(a.clone())));

        let same = (a.clone() | b.clone()) | a.clone();
        assert_eq!(same, ab);

        let mut grown = ab.clone();
        grown |= &foo;
        assert_eq!(grown.len(), 3);
        assert!(grown.is_superset(&ab));
        assert!(!ab.is_superset(&grown));
    }

    #[tokio::test]
    async fn test_empty_stream_ends() {
        let mut stream = Subs::new().stream();
        assert_eq!(stream.next().await, None);
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_member_end_keeps_merge_alive() {
        let (foo, bar) = routes();
        let a = foo.sub();
        let b = bar.sub();
        let subs = a.clone() | b.clone();
        let mut stream = subs.stream();

        a.unsubscribe();
        b.publish_nowait(args![2]);
        assert_eq!(stream.next().await, Some((bar.clone(), args![2])));
        assert_eq!(stream.len(), 1);

        b.unsubscribe();
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_detach_leaves_values_queued() {
        let (foo, bar) = routes();
        let a = foo.sub();
        let b = bar.sub();
        let mut stream = (a.clone() | b.clone()).stream();

        assert!(stream.detach(&a));
        assert!(!stream.detach(&a));
        a.publish_nowait(args![1]);
        b.publish_nowait(args![2]);
        assert_eq!(stream.next().await, Some((bar.clone(), args![2])));
        assert_eq!(a.next().await, Some(args![1]));

        assert!(stream.attach(a.clone()));
        assert!(!stream.attach(a.clone()));
        a.publish_nowait(args![3]);
        assert_eq!(stream.next().await, Some((foo.clone(), args![3])));
    }

    #[tokio::test]
    async fn test_detach_releases_in_flight_read() {
        let (foo, bar) = routes();
        let a = foo.sub();
        let b = bar.sub();
        let mut stream = (a.clone() | b.clone()).stream();

        // Both members now have a read parked on their inbox
        assert!(timeout(Duration::from_millis(20), stream.next()).await.is_err());
        b.publish_nowait(args![2]);

        assert!(stream.detach(&a));
        a.publish_nowait(args![1]);
        let direct = timeout(Duration::from_secs(1), a.next()).await;
        assert_eq!(direct.unwrap(), Some(args![1]));

        assert_eq!(stream.next().await, Some((bar.clone(), args![2])));
        assert_eq!(stream.len(), 1);
        assert!(!stream.is_terminated());

        b.unsubscribe();
        assert_eq!(stream.next().await, None);
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_publish_to_all_members() {
        let (foo, bar) = routes();
        let subs = Subs::new() | &foo | &bar;
        assert_eq!(subs.publish(args![5]).await, 2);
        for sub in &subs {
            assert_eq!(sub.next().await, Some(args![5]));
        }
        assert_eq!(subs.unsubscribe(), 2);
        assert_eq!(subs.unsubscribe(), 0);
    }
}
