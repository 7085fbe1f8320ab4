//! notimock-services: mock implementations of the two notification wire
//! contracts (the direct `org.freedesktop.Notifications` daemon and the
//! sandbox portal `org.freedesktop.portal.Notification`) plus the
//! append-only call log the assertion layer queries.
//!
//! The protocol-facing surface of each mock is its `BusService` impl; the
//! `emit_*` methods are a separate harness-only control interface and are
//! never reachable over the bus.

pub mod call_log;
pub mod direct;
pub mod portal;

pub use call_log::{CallLog, CallRecord};
pub use direct::{DEFAULT_CAPABILITIES, DIRECT_INTERFACE, DirectServiceMock};
pub use portal::{PORTAL_INTERFACE, PortalServiceMock};
