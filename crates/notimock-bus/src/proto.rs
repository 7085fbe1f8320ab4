//! Wire frames: newline-delimited JSON, one frame per line.

use serde::{Deserialize, Serialize};

use notimock_core::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Method call from a client. `serial` correlates the reply.
    Call {
        serial: u64,
        interface: String,
        method: String,
        args: Vec<Value>,
    },
    Reply {
        serial: u64,
        result: Vec<Value>,
    },
    Error {
        serial: u64,
        name: String,
        message: String,
    },
    /// Broadcast signal, delivered to every connected client.
    Signal {
        interface: String,
        member: String,
        args: Vec<Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let frame = Frame::Call {
            serial: 7,
            interface: "org.freedesktop.Notifications".to_string(),
            method: "Notify".to_string(),
            args: vec![Value::str("notify-send"), Value::U32(0)],
        };
        let line = serde_json::to_string(&frame).expect("encode");
        let back: Frame = serde_json::from_str(&line).expect("decode");
        assert_eq!(back, frame);
    }

    #[test]
    fn signal_frame_has_no_serial() {
        let frame = Frame::Signal {
            interface: "org.freedesktop.Notifications".to_string(),
            member: "ActionInvoked".to_string(),
            args: vec![Value::U32(1), Value::str("bar-action")],
        };
        let line = serde_json::to_string(&frame).expect("encode");
        assert!(!line.contains("serial"));
    }
}
