//! # swergio-client
//!
//! A component's session with the swergio broker.
//!
//! - [`Client`] joins rooms, sends messages, and runs the dispatch loop
//! - [`HandlerRegistration`] binds a [`Trigger`](swergio_core::Trigger) to a
//!   [`Handler`] and an optional reply route
//! - [`Outbox`] queues frames for the session's single writer task
//!
//! ```text
//! let mut client = Client::connect(ClientConfig::new("world", addr), ()).await?;
//! client.add_handler(
//!     HandlerRegistration::from_fn(Trigger::new(MessageType::Text, "galactic_chat"), greet)
//!         .respond(MessageType::Text, "galactic_chat"),
//! )?;
//! client.listen().await?;
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod handler;
pub mod outbox;

pub use client::{Client, LoopExit, Receive};
pub use config::ClientConfig;
pub use errors::{ClientError, HandlerError, Result};
pub use handler::{Handler, HandlerContext, HandlerRegistration, HandlerResult, Reply, Response, StopHandle};
pub use outbox::Outbox;
