//! Append-only method-call log. Each mock owns one; the harness only reads
//! it through [`CallLog::calls`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use notimock_core::Value;

/// One captured method call, stored verbatim and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub method: String,
    pub args: Vec<Value>,
    pub ret: Option<Value>,
    pub received_at: DateTime<Utc>,
}

/// Shared handle to an append-only call sequence.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &str, args: Vec<Value>, ret: Option<Value>) {
        tracing::debug!(method, "call recorded");
        self.entries.lock().expect("call log lock").push(CallRecord {
            method: method.to_string(),
            args,
            ret,
            received_at: Utc::now(),
        });
    }

    /// All captured calls to `method`, in arrival order.
    pub fn calls(&self, method: &str) -> Vec<CallRecord> {
        self.entries
            .lock()
            .expect("call log lock")
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("call log lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_filters_by_method() {
        let log = CallLog::new();
        log.record("Notify", vec![Value::str("a")], Some(Value::U32(1)));
        log.record("CloseNotification", vec![Value::U32(1)], None);
        log.record("Notify", vec![Value::str("b")], Some(Value::U32(1)));

        let notifies = log.calls("Notify");
        assert_eq!(notifies.len(), 2);
        assert_eq!(notifies[0].args, vec![Value::str("a")]);
        assert_eq!(notifies[1].args, vec![Value::str("b")]);
        assert_eq!(log.calls("GetCapabilities").len(), 0);
        assert_eq!(log.len(), 3);
        // Timestamps carry the arrival order even across method filters.
        assert!(notifies[0].received_at <= notifies[1].received_at);
        let close = log.calls("CloseNotification").remove(0);
        assert!(notifies[0].received_at <= close.received_at);
        assert!(close.received_at <= notifies[1].received_at);
    }
}
