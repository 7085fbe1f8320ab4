//! Error types for the bus transport.

use thiserror::Error;

/// A protocol-level error a service returns from a method call. Crosses the
/// bus as an error frame and surfaces on the caller's side as
/// [`BusError::Call`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct CallError {
    pub name: String,
    pub message: String,
}

impl CallError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unknown_method(interface: &str, method: &str) -> Self {
        Self::new("UnknownMethod", format!("no method {method} on {interface}"))
    }

    pub fn unknown_interface(interface: &str) -> Self {
        Self::new("UnknownInterface", format!("no service owns {interface}"))
    }

    pub fn invalid_args(method: &str) -> Self {
        Self::new("InvalidArgs", format!("bad argument list for {method}"))
    }

    pub fn key_not_found(id: &str) -> Self {
        Self::new("KeyNotFound", format!("no notification with id {id:?}"))
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed bus frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("bus connection closed")]
    Closed,

    #[error("call failed: {0}")]
    Call(#[from] CallError),

    #[error("another broker is already listening at {0}")]
    AddressInUse(String),
}
