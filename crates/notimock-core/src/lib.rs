//! notimock-core: pure protocol types shared by the mocks, the harness and
//! the reference client. Wire value codec, hint-literal parsing, action-id
//! assignment, urgency/close-reason taxonomy. No IO.

pub mod actions;
pub mod error;
pub mod value;

pub use actions::{Action, ActionSpec, assign, direct_list, portal_buttons};
pub use error::ValueError;
pub use value::{CloseReason, HintKind, Urgency, Value, parse_hint_arg};

/// Interface name of the direct notifications daemon.
pub const DIRECT_INTERFACE: &str = "org.freedesktop.Notifications";

/// Interface name of the sandbox notification portal.
pub const PORTAL_INTERFACE: &str = "org.freedesktop.portal.Notification";
