//! notimock-bus: the message-bus substrate. An in-process broker listening
//! on a Unix domain socket, newline-delimited JSON frames, and a client
//! used by the notification sender under test. No notification semantics
//! live here, pure transport.

pub mod broker;
pub mod client;
pub mod error;
pub mod proto;

pub use broker::{Broker, BusService, SignalEmitter};
pub use client::{BusClient, Signal};
pub use error::{BusError, CallError};
pub use proto::Frame;

/// Environment variable carrying the bus socket path to spawned clients.
pub const BUS_ADDRESS_ENV: &str = "NOTIMOCK_BUS_ADDRESS";
