//! Server-side route registry and inbound dispatch

use dashmap::DashMap;
use oscroute_core::{OscPacket, OscType, Path};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, RouterError};
use crate::route::Route;

/// Registered routes, keyed by literal address
#[derive(Default)]
pub struct RouteTable {
    by_address: DashMap<String, Vec<Route>>,
    any: RwLock<Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route and return the handle subscribers should use.
    ///
    /// If an equal route is already registered, its handle is returned.
    pub fn route(&self, route: Route) -> Result<Route> {
        if route.is_pattern() {
            return Err(RouterError::Route(format!(
                "cannot serve pattern route {}",
                route
            )));
        }

        match route.path().as_literal() {
            Some(address) => {
                let mut entry = self.by_address.entry(address.to_string()).or_default();
                if let Some(existing) = entry.iter().find(|r| **r == route) {
                    return Ok(existing.clone());
                }
                entry.push(route.clone());
            }
            None => {
                let mut any = self.any.write();
                if let Some(existing) = any.iter().find(|r| **r == route) {
                    return Ok(existing.clone());
                }
                any.push(route.clone());
            }
        }

        info!("Serving {}", route);
        Ok(route)
    }

    /// Withdraw a route and end every subscription on it
    pub fn unroute(&self, route: &Route) -> bool {
        let removed = match route.path().as_literal() {
            Some(address) => {
                let mut removed = None;
                if let Some(mut entry) = self.by_address.get_mut(address) {
                    if let Some(pos) = entry.iter().position(|r| r == route) {
                        removed = Some(entry.remove(pos));
                    }
                }
                self.by_address.remove_if(address, |_, routes| routes.is_empty());
                removed
            }
            None => {
                let mut any = self.any.write();
                any.iter()
                    .position(|r| r == route)
                    .map(|pos| any.remove(pos))
            }
        };

        match removed {
            Some(registered) => {
                let count = registered.unsubscribe_all();
                info!("Stopped serving {} ({} subscribers ended)", registered, count);
                true
            }
            None => false,
        }
    }

    /// The registered handle equal to `route`
    pub fn get(&self, route: &Route) -> Option<Route> {
        match route.path().as_literal() {
            Some(address) => self
                .by_address
                .get(address)
                .and_then(|routes| routes.iter().find(|r| *r == route).cloned()),
            None => self.any.read().iter().find(|r| *r == route).cloned(),
        }
    }

    pub fn contains(&self, route: &Route) -> bool {
        self.get(route).is_some()
    }

    /// Routes registered at a literal address
    pub fn routes_at(&self, address: &str) -> Vec<Route> {
        self.by_address
            .get(address)
            .map(|routes| routes.value().clone())
            .unwrap_or_default()
    }

    /// Every registered route
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .by_address
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        routes.extend(self.any.read().iter().cloned());
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.by_address.iter().map(|e| e.value().len()).sum::<usize>() + self.any.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Withdraw every route
    pub fn clear(&self) {
        for route in self.routes() {
            self.unroute(&route);
        }
    }

    fn candidates(&self, address: &Path) -> Vec<Route> {
        let mut routes = match address {
            Path::Literal(literal) => self.routes_at(literal),
            _ => self
                .by_address
                .iter()
                .filter(|entry| address.matches(entry.key()))
                .flat_map(|entry| entry.value().clone())
                .collect(),
        };
        routes.extend(self.any.read().iter().cloned());
        routes
    }

    /// Deliver an incoming message to every route it matches.
    ///
    /// `address` may be a pattern, in which case every registered literal
    /// route it matches is a candidate. Returns the number of routes
    /// delivered to.
    pub fn dispatch(&self, address: &str, args: &[OscType]) -> Result<usize> {
        let path = Path::parse(address)?;
        let mut delivered = 0;

        for route in self.candidates(&path) {
            if !route.typespec().accepts_wire(args) {
                continue;
            }
            match route.typespec().unpack(args) {
                Ok(values) => {
                    route.publish_nowait(values);
                    delivered += 1;
                }
                Err(e) => warn!("{}: could not decode arguments: {}", route, e),
            }
        }

        if delivered == 0 {
            debug!("No route for {} {:?}", address, args);
            return Err(RouterError::Route(format!("no route for {}", address)));
        }
        Ok(delivered)
    }

    /// Dispatch every message in a packet, descending into bundles.
    ///
    /// Bundle contents are delivered immediately regardless of timetag.
    pub fn dispatch_packet(&self, packet: &OscPacket) -> usize {
        match packet {
            OscPacket::Message(msg) => match self.dispatch(&msg.addr, &msg.args) {
                Ok(n) => n,
                Err(e) => {
                    debug!("Dropped message: {}", e);
                    0
                }
            },
            OscPacket::Bundle(bundle) => bundle
                .content
                .iter()
                .map(|p| self.dispatch_packet(p))
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscroute_core::{args, ANY_ARGS, NO_ARGS};

    #[test]
    fn test_rejects_pattern_routes() {
        let table = RouteTable::new();
        let route = Route::parse("/*/foo", "i").unwrap();
        assert!(matches!(table.route(route), Err(RouterError::Route(_))));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_equal_routes_share_handle() {
        let table = RouteTable::new();
        let first = table.route(Route::parse("/foo", "i").unwrap()).unwrap();
        let second = table.route(Route::parse("/foo", "i").unwrap()).unwrap();
        assert!(first.same_handle(&second));
        table.route(Route::parse("/foo", "s").unwrap()).unwrap();
        assert_eq!(table.len(), 2);

        let sub = first.sub();
        assert_eq!(table.dispatch("/foo", &[OscType::Int(3)]).unwrap(), 1);
        assert_eq!(sub.next().await, Some(args![3]));
    }

    #[test]
    fn test_dispatch_miss() {
        let table = RouteTable::new();
        table.route(Route::parse("/foo", "i").unwrap()).unwrap();
        assert!(table.dispatch("/bar", &[OscType::Int(1)]).is_err());
        assert!(table.dispatch("/foo", &[OscType::Float(1.0)]).is_err());
        assert!(matches!(
            table.dispatch("bad", &[]),
            Err(RouterError::Core(_))
        ));
    }

    #[tokio::test]
    async fn test_pattern_address_and_any_route() {
        let table = RouteTable::new();
        let a = table.route(Route::parse("/aaa/foo", NO_ARGS).unwrap()).unwrap();
        let b = table.route(Route::parse("/bbb/foo", NO_ARGS).unwrap()).unwrap();
        let any = table.route(Route::any(ANY_ARGS)).unwrap();
        let (sa, sb, sany) = (a.sub(), b.sub(), any.sub());

        assert_eq!(table.dispatch("/{aaa,bbb}/foo", &[]).unwrap(), 3);
        assert_eq!(sa.next().await, Some(vec![]));
        assert_eq!(sb.next().await, Some(vec![]));
        assert_eq!(sany.next().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_unroute_ends_subscriptions() {
        let table = RouteTable::new();
        let route = table.route(Route::parse("/foo", "i").unwrap()).unwrap();
        let sub = route.sub();
        table.dispatch("/foo", &[OscType::Int(1)]).unwrap();

        assert!(table.unroute(&Route::parse("/foo", "i").unwrap()));
        assert!(!table.unroute(&route));
        assert!(table.is_empty());
        assert_eq!(sub.next().await, Some(args![1]));
        assert_eq!(sub.next().await, None);
    }
}
