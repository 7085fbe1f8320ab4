//! notimock-harness: owns the lifecycle of one client invocation under
//! test. Spawns the notification sender with a controlled environment,
//! hands it inheritable file-descriptor channels for out-of-band results,
//! polls those channels with explicit bounds while the client blocks on
//! simulated user interaction, and checks captured calls against expected
//! records.
//!
//! Usage invariant: assert the mock call (via [`assert::single_call`])
//! before injecting the signal that unblocks a channel. Injecting first is
//! an ill-formed scenario: the client may not have subscribed yet.

pub mod assert;
pub mod channel;
pub mod error;
pub mod process;

pub use assert::{NotifyExpectation, PortalExpectation, await_single_call, single_call};
pub use channel::{FdChannel, await_line};
pub use error::HarnessError;
pub use process::{BackendMode, ClientCommand, ClientProcess};

use std::time::Duration;

/// Default bound for channel and stderr waits.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(10);

/// Default bound for joining a client that is expected to exit.
pub const EXIT_WAIT: Duration = Duration::from_secs(5);
