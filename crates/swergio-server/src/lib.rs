//! # swergio-server
//!
//! The broker every swergio component connects to.
//!
//! - [`Broker`] accepts TCP connections and spawns one task per connection
//! - [`RoomRegistry`] tracks room membership and fans frames out to members
//! - [`BrokerConnection`] is a member's bounded outbound queue
//! - [`ShutdownCoordinator`] cancels the accept loop and connection tasks
//!
//! Routing never inspects payloads: the broker reads only `TYPE` and
//! `TO_ROOM` and forwards the original bytes.

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::BrokerConfig;
pub use connection::BrokerConnection;
pub use errors::{BrokerError, Result};
pub use registry::{RoomRegistry, RouteOutcome};
pub use server::Broker;
pub use session::ConnectionExit;
pub use shutdown::ShutdownCoordinator;
