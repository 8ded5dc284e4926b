//! oscroute router
//!
//! Publish/subscribe over OSC routes:
//! - [`Route`]: an address and the typespec of its arguments
//! - [`Sub`] / [`Subs`]: FIFO subscriber inboxes and their fair merge
//! - [`RouteTable`] / [`Server`]: serve literal routes and dispatch
//!   incoming packets to them
//! - [`Client`]: validate and send values to routes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oscroute_core::args;
//! use oscroute_router::{Client, ClientConfig, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Arc::new(Server::new(ServerConfig::default())?);
//!     let route = server.route_path("/synth/volume", "f")?;
//!     let sub = route.sub();
//!     server.bind_udp().await?;
//!     server.spawn();
//!
//!     let client = Client::connect(&ClientConfig::default()).await?;
//!     client.send(&route, &args![0.5]).await?;
//!
//!     while let Some(values) = sub.next().await {
//!         println!("volume: {:?}", values);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod message;
pub mod route;
pub mod server;
pub mod sub;
pub mod subs;
pub mod table;

pub use client::{Client, ClientConfig};
pub use error::{Result, RouterError};
pub use message::{Bundle, BundleItem, Message};
pub use route::Route;
pub use server::{Server, ServerConfig};
pub use sub::Sub;
pub use subs::{Subs, SubsStream};
pub use table::RouteTable;
