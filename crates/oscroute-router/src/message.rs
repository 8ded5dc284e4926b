//! Outgoing messages and bundles
//!
//! A [`Message`] is a route plus arguments already packed for the wire, so
//! building one is where argument validation fails. A [`Bundle`] groups
//! messages and nested bundles under one timetag.

use std::cmp::Ordering;

use oscroute_core::{Error, OscMessage, OscPacket, OscType, TimeTag, Value};
use rosc::OscBundle;

use crate::error::{Result, RouterError};
use crate::route::Route;

/// A route with packed arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    route: Route,
    args: Vec<OscType>,
}

impl Message {
    /// Validate and pack `values` with the route's typespec
    pub fn new(route: Route, values: &[Value]) -> oscroute_core::Result<Self> {
        let args = route.pack(values)?;
        Ok(Self { route, args })
    }

    /// Wrap arguments received from the wire
    pub fn from_wire(route: Route, args: Vec<OscType>) -> oscroute_core::Result<Self> {
        if !route.typespec().accepts_wire(&args) {
            return Err(Error::Type(format!(
                "arguments do not match typespec {}",
                route.typespec()
            )));
        }
        Ok(Self { route, args })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn args(&self) -> &[OscType] {
        &self.args
    }

    /// Decode the arguments back to values
    pub fn unpack(&self) -> oscroute_core::Result<Vec<Value>> {
        self.route.typespec().unpack(&self.args)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.route.addresses()
    }

    /// One wire packet per target address
    pub fn to_packets(&self) -> Result<Vec<OscPacket>> {
        let addresses = self.addresses();
        if addresses.is_empty() {
            return Err(RouterError::Send(format!(
                "{} has no address to send to",
                self.route
            )));
        }
        Ok(addresses
            .into_iter()
            .map(|addr| {
                OscPacket::Message(OscMessage {
                    addr,
                    args: self.args.clone(),
                })
            })
            .collect())
    }
}

/// A bundle element
#[derive(Debug, Clone, PartialEq)]
pub enum BundleItem {
    Message(Message),
    Bundle(Bundle),
}

impl From<Message> for BundleItem {
    fn from(message: Message) -> Self {
        BundleItem::Message(message)
    }
}

impl From<Bundle> for BundleItem {
    fn from(bundle: Bundle) -> Self {
        BundleItem::Bundle(bundle)
    }
}

/// Messages and nested bundles applied at one timetag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bundle {
    timetag: TimeTag,
    items: Vec<BundleItem>,
}

impl Bundle {
    pub fn new(timetag: TimeTag) -> Self {
        Self {
            timetag,
            items: Vec::new(),
        }
    }

    pub fn with_items<I, T>(items: I, timetag: TimeTag) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BundleItem>,
    {
        Self {
            timetag,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn timetag(&self) -> TimeTag {
        self.timetag
    }

    pub fn set_timetag(&mut self, timetag: TimeTag) {
        self.timetag = timetag;
    }

    pub fn push(&mut self, item: impl Into<BundleItem>) {
        self.items.push(item.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BundleItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BundleItem> {
        self.items.iter()
    }

    /// Order by timetag only
    pub fn cmp_timetag(&self, other: &Bundle) -> Ordering {
        self.timetag.cmp(&other.timetag)
    }

    /// Encode as a wire bundle; multi-address messages expand in place
    pub fn to_packet(&self) -> Result<OscPacket> {
        let mut content = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                BundleItem::Message(message) => content.extend(message.to_packets()?),
                BundleItem::Bundle(bundle) => content.push(bundle.to_packet()?),
            }
        }
        Ok(OscPacket::Bundle(OscBundle {
            timetag: self.timetag.into(),
            content,
        }))
    }
}

impl<T: Into<BundleItem>> Extend<T> for Bundle {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter.into_iter().map(Into::into));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscroute_core::{args, ErrorKind, TT_IMMEDIATE};

    #[test]
    fn test_message_validates_on_construction() {
        let route = Route::parse("/foo", "i").unwrap();
        let err = Message::new(route.clone(), &args!["nope"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);

        let message = Message::new(route, &args!["12"]).unwrap();
        assert_eq!(message.args(), &[OscType::Int(12)]);
        assert_eq!(message.unpack().unwrap(), args![12]);
    }

    #[test]
    fn test_union_route_fans_out() {
        let a = Route::parse("/a", "i").unwrap();
        let b = Route::parse("/b", "i").unwrap();
        let message = Message::new(a.union(&b).unwrap(), &args![1]).unwrap();
        let packets = message.to_packets().unwrap();
        assert_eq!(packets.len(), 2);
    }

    #[test]
    fn test_any_path_cannot_be_sent() {
        let message = Message::new(Route::default(), &args![1]).unwrap();
        assert!(matches!(message.to_packets(), Err(RouterError::Send(_))));
    }

    #[test]
    fn test_from_wire_checks_types() {
        let route = Route::parse("/foo", "s").unwrap();
        assert!(Message::from_wire(route.clone(), vec![OscType::Int(1)]).is_err());
        assert!(Message::from_wire(route, vec![OscType::String("x".into())]).is_ok());
    }

    #[test]
    fn test_bundle() {
        let route = Route::parse("/foo", "i").unwrap();
        let mut bundle = Bundle::default();
        assert_eq!(bundle.timetag(), TT_IMMEDIATE);
        bundle.push(Message::new(route.clone(), &args![1]).unwrap());
        bundle.extend([Message::new(route.clone(), &args![2]).unwrap()]);
        bundle.push(Bundle::new(TimeTag::new(10, 0)));
        assert_eq!(bundle.len(), 3);
        assert!(matches!(bundle.get(2), Some(BundleItem::Bundle(_))));
        assert!(bundle.get(3).is_none());

        let later = Bundle::new(TimeTag::new(1, 0));
        assert_eq!(bundle.cmp_timetag(&later), Ordering::Less);

        match bundle.to_packet().unwrap() {
            OscPacket::Bundle(b) => {
                assert_eq!(b.content.len(), 3);
                assert_eq!((b.timetag.seconds, b.timetag.fractional), (0, 1));
            }
            other => panic!("expected bundle, got {:?}", other),
        }
    }
}
