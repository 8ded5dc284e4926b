//! Routes: an address paired with the argument types it carries
//!
//! A [`Route`] is a cheap, clonable handle. Clones share one subscriber
//! list, so a value published through any clone reaches every [`Sub`]
//! created from any other. Two independently built routes with the same
//! path and typespec compare equal but keep separate subscriber lists;
//! [`RouteTable`](crate::RouteTable) hands out the registered handle to
//! join them.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use oscroute_core::{Descriptor, Error, OscType, Path, Result, TypeSpec, Value, ANY_ARGS};
use parking_lot::Mutex;
use tracing::debug;

use crate::sub::{Sub, SubShared};

struct RouteInner {
    path: Path,
    typespec: TypeSpec,
    subs: Mutex<Vec<Arc<SubShared>>>,
}

/// An OSC address (or pattern) and the typespec of its arguments
#[derive(Clone)]
pub struct Route {
    inner: Arc<RouteInner>,
}

impl Route {
    pub fn new(path: Path, typespec: TypeSpec) -> Self {
        Self {
            inner: Arc::new(RouteInner {
                path,
                typespec,
                subs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build from an address string and any typespec descriptor
    pub fn parse(path: &str, typespec: impl Into<Descriptor>) -> Result<Self> {
        Ok(Self::new(
            Path::parse(path)?,
            TypeSpec::from_descriptor(typespec)?,
        ))
    }

    /// A route receiving every address
    pub fn any(typespec: TypeSpec) -> Self {
        Self::new(Path::ANY, typespec)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn typespec(&self) -> &TypeSpec {
        &self.inner.typespec
    }

    pub fn is_pattern(&self) -> bool {
        self.inner.path.is_pattern()
    }

    pub fn matches_any_path(&self) -> bool {
        self.inner.path.is_any()
    }

    pub fn matches_any_args(&self) -> bool {
        self.inner.typespec.is_any_args()
    }

    pub fn matches_no_args(&self) -> bool {
        self.inner.typespec.is_no_args()
    }

    /// Any address, any arguments
    pub fn matches_any(&self) -> bool {
        self.matches_any_path() && self.matches_any_args()
    }

    /// Whether an incoming message at `address` with `args` belongs here
    pub fn accepts(&self, address: &str, args: &[OscType]) -> bool {
        self.inner.path.matches(address) && self.inner.typespec.accepts_wire(args)
    }

    /// Whether `other` is covered by this route
    pub fn contains(&self, other: &Route) -> bool {
        self.inner.path.contains(&other.inner.path)
            && self.inner.typespec.contains(&other.inner.typespec)
    }

    /// Whether some address is served by both routes
    pub fn intersects_with(&self, other: &Route) -> bool {
        if self.inner.typespec != other.inner.typespec
            && !self.matches_any_args()
            && !other.matches_any_args()
        {
            return false;
        }
        let (a, b) = (&self.inner.path, &other.inner.path);
        a.contains(b)
            || b.contains(a)
            || a.addresses().iter().any(|s| b.matches(s))
            || b.addresses().iter().any(|s| a.matches(s))
    }

    /// The route covering both paths; typespecs must be equal
    pub fn union(&self, other: &Route) -> Result<Route> {
        if self.inner.typespec != other.inner.typespec {
            return Err(Error::Value(format!(
                "cannot union routes with different typespecs: {} and {}",
                self.inner.typespec, other.inner.typespec
            )));
        }
        Ok(Route::new(
            self.inner.path.union(&other.inner.path),
            self.inner.typespec.clone(),
        ))
    }

    /// Wire addresses a send to this route goes to
    pub fn addresses(&self) -> Vec<String> {
        self.inner.path.addresses()
    }

    /// Validate and convert values for the wire
    pub fn pack(&self, values: &[Value]) -> Result<Vec<OscType>> {
        self.inner.typespec.pack(values)
    }

    /// Create a new subscriber
    pub fn sub(&self) -> Sub {
        let (sub, shared) = Sub::new(self.clone());
        self.inner.subs.lock().push(shared);
        debug!("{}: created", sub);
        sub
    }

    /// Remove a subscriber and end its sequence.
    ///
    /// Returns false if it was already unsubscribed or belongs to a
    /// different route handle.
    pub fn unsub(&self, sub: &Sub) -> bool {
        if !sub.route().same_handle(self) {
            return false;
        }
        let id = sub.id();
        self.inner.subs.lock().retain(|s| s.id() != id);
        let terminated = sub.shared().terminate();
        if terminated {
            debug!("{}: unsubscribed", sub);
        }
        terminated
    }

    /// Whether both handles share one subscriber list
    pub fn same_handle(&self, other: &Route) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Unsubscribe every current subscriber; returns how many there were
    pub fn unsubscribe_all(&self) -> usize {
        let subs = std::mem::take(&mut *self.inner.subs.lock());
        for shared in &subs {
            shared.terminate();
        }
        if !subs.is_empty() {
            debug!("{}: unsubscribed {} subscribers", self, subs.len());
        }
        subs.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.lock().len()
    }

    /// Enqueue values on every current subscriber without waiting.
    ///
    /// Delivers to a snapshot of the subscriber list taken on entry.
    /// Returns the number of subscribers reached.
    pub fn publish_nowait(&self, values: Vec<Value>) -> usize {
        let subs: Vec<Arc<SubShared>> = self.inner.subs.lock().clone();
        debug!("{}: publish {:?} to {} subscribers", self, values, subs.len());
        let mut delivered = 0;
        if let Some((last, rest)) = subs.split_last() {
            for shared in rest {
                if shared.deliver(values.clone()) {
                    delivered += 1;
                }
            }
            if last.deliver(values) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Publish, then yield so subscribers can run
    pub async fn publish(&self, values: Vec<Value>) -> usize {
        let delivered = self.publish_nowait(values);
        tokio::task::yield_now().await;
        delivered
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::any(ANY_ARGS)
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.inner.path == other.inner.path && self.inner.typespec == other.inner.typespec
    }
}

impl Eq for Route {}

impl Hash for Route {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.path.hash(state);
        self.inner.typespec.hash(state);
    }
}

impl PartialOrd for Route {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Route {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.inner.path, &self.inner.typespec).cmp(&(&other.inner.path, &other.inner.typespec))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route({:?}, {:?})", self.inner.path.to_string(), self.inner.typespec.to_string())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route({}, {})", self.inner.path, self.inner.typespec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscroute_core::{args, ErrorKind, NO_ARGS};

    #[test]
    fn test_sentinels() {
        let route = Route::default();
        assert!(route.matches_any());
        assert!(!route.is_pattern());

        let route = Route::parse("/foo", NO_ARGS).unwrap();
        assert!(route.matches_no_args());
        assert!(!route.matches_any_path());
    }

    #[test]
    fn test_equality_ignores_handle() {
        let a = Route::parse("/foo", "s").unwrap();
        let b = Route::parse("/foo", "s").unwrap();
        let c = Route::parse("/foo", "i").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_union_requires_equal_typespecs() {
        let a = Route::parse("/foo", "s").unwrap();
        let b = Route::parse("/bar", "i").unwrap();
        let err = a.union(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_union_matches_both() {
        let a = Route::parse("/foo", "s").unwrap();
        let b = Route::parse("/bar", "s").unwrap();
        let both = a.union(&b).unwrap();
        assert!(both.is_pattern());
        assert!(both.contains(&a));
        assert!(both.contains(&b));
        assert!(!both.contains(&Route::parse("/baz", "s").unwrap()));
        assert!(!both.contains(&Route::parse("/foo", "i").unwrap()));
    }

    #[test]
    fn test_contains_pattern_and_any_args() {
        let pattern = Route::parse("/*/foo", ANY_ARGS).unwrap();
        assert!(pattern.contains(&Route::parse("/aaa/foo", "i").unwrap()));
        assert!(!pattern.contains(&Route::parse("/aaa/bar", "i").unwrap()));
        assert!(Route::default().contains(&pattern));
    }

    #[test]
    fn test_intersects_with() {
        let pattern = Route::parse("/*/foo", "i").unwrap();
        let literal = Route::parse("/a/foo", "i").unwrap();
        assert!(pattern.intersects_with(&literal));
        assert!(literal.intersects_with(&pattern));
        assert!(!literal.intersects_with(&Route::parse("/a/foo", "s").unwrap()));
    }

    #[tokio::test]
    async fn test_publish_reaches_every_clone() {
        let route = Route::parse("/foo", "i").unwrap();
        let a = route.sub();
        let b = route.clone().sub();
        assert_eq!(route.subscriber_count(), 2);
        assert_eq!(route.publish(args![7]).await, 2);
        assert_eq!(a.next().await, Some(args![7]));
        assert_eq!(b.next().await, Some(args![7]));
    }

    #[tokio::test]
    async fn test_unsubscribe_all() {
        let route = Route::parse("/foo", "i").unwrap();
        let a = route.sub();
        let b = route.sub();
        route.publish_nowait(args![1]);
        assert_eq!(route.unsubscribe_all(), 2);
        assert_eq!(route.subscriber_count(), 0);
        assert_eq!(route.publish_nowait(args![2]), 0);
        assert_eq!(a.next().await, Some(args![1]));
        assert_eq!(a.next().await, None);
        assert_eq!(b.next().await, Some(args![1]));
        assert_eq!(b.next().await, None);
    }
}
