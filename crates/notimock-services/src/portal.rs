//! Mock of the sandbox portal `org.freedesktop.portal.Notification`
//! interface. Unlike the direct mock this one keeps a live id → record map:
//! the portal contract is keyed by caller-chosen string ids with upsert and
//! remove semantics, so correctness needs current existence, not just call
//! history.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use notimock_bus::{BusService, CallError, SignalEmitter};
use notimock_core::Value;

use crate::call_log::CallLog;

pub use notimock_core::PORTAL_INTERFACE;

pub struct PortalServiceMock {
    version: u32,
    supported_options: BTreeMap<String, Value>,
    notifications: Mutex<HashMap<String, Value>>,
    log: CallLog,
    emitter: SignalEmitter,
}

impl PortalServiceMock {
    pub fn new(emitter: SignalEmitter) -> Arc<Self> {
        Self::with_options(emitter, 1, BTreeMap::new())
    }

    pub fn with_options(
        emitter: SignalEmitter,
        version: u32,
        supported_options: BTreeMap<String, Value>,
    ) -> Arc<Self> {
        Arc::new(Self {
            version,
            supported_options,
            notifications: Mutex::new(HashMap::new()),
            log: CallLog::new(),
            emitter,
        })
    }

    pub fn call_log(&self) -> &CallLog {
        &self.log
    }

    /// Current record for `id`, if the notification is live.
    pub fn notification(&self, id: &str) -> Option<Value> {
        self.notifications
            .lock()
            .expect("notifications lock")
            .get(id)
            .cloned()
    }

    pub fn live_count(&self) -> usize {
        self.notifications.lock().expect("notifications lock").len()
    }

    // ── Harness-only signal injection ─────────────────────────────

    pub fn emit_action_invoked(&self, id: &str, action: &str, parameters: Vec<Value>) {
        self.emitter.emit(
            PORTAL_INTERFACE,
            "ActionInvoked",
            vec![
                Value::str(id),
                Value::str(action),
                Value::Array(parameters),
            ],
        );
    }
}

impl BusService for PortalServiceMock {
    fn interface(&self) -> &str {
        PORTAL_INTERFACE
    }

    fn properties(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("version".to_string(), Value::U32(self.version)),
            (
                "SupportedOptions".to_string(),
                Value::Dict(self.supported_options.clone()),
            ),
        ])
    }

    fn handle_call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>, CallError> {
        match method {
            "AddNotification" => {
                let (id, record) = match args {
                    [Value::Str(id), record @ Value::Dict(_)] => (id.clone(), record.clone()),
                    _ => return Err(CallError::invalid_args(method)),
                };
                self.log.record(method, args.to_vec(), None);
                self.notifications
                    .lock()
                    .expect("notifications lock")
                    .insert(id, record);
                Ok(vec![])
            }
            "RemoveNotification" => {
                let id = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| CallError::invalid_args(method))?;
                self.log.record(method, args.to_vec(), None);
                self.notifications
                    .lock()
                    .expect("notifications lock")
                    .remove(id)
                    .ok_or_else(|| CallError::key_not_found(id))?;
                Ok(vec![])
            }
            _ => Err(CallError::unknown_method(PORTAL_INTERFACE, method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notimock_bus::{Broker, BusClient, BusError};

    async fn setup(dir: &tempfile::TempDir) -> (Broker, Arc<PortalServiceMock>, BusClient) {
        let socket = dir.path().join("bus.sock").to_string_lossy().into_owned();
        let broker = Broker::start(&socket).await.expect("broker");
        let mock = PortalServiceMock::new(broker.emitter());
        broker.register(mock.clone());
        let client = BusClient::connect(&socket).await.expect("connect");
        (broker, mock, client)
    }

    fn record(title: &str) -> Value {
        Value::dict([
            ("title", Value::str(title)),
            ("body", Value::str("")),
            ("priority", Value::str("normal")),
        ])
    }

    #[tokio::test]
    async fn add_upserts_and_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, mock, mut client) = setup(&dir).await;

        let id = "(null)-notify-send-1";
        client
            .call(
                PORTAL_INTERFACE,
                "AddNotification",
                vec![Value::str(id), record("first")],
            )
            .await
            .expect("add");
        client
            .call(
                PORTAL_INTERFACE,
                "AddNotification",
                vec![Value::str(id), record("second")],
            )
            .await
            .expect("update");

        // Same id: one live record holding the later value, two log entries.
        assert_eq!(mock.live_count(), 1);
        assert_eq!(mock.notification(id), Some(record("second")));
        assert_eq!(mock.call_log().calls("AddNotification").len(), 2);
    }

    #[tokio::test]
    async fn remove_deletes_live_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, mock, mut client) = setup(&dir).await;

        let id = "(null)-notify-send-1";
        client
            .call(
                PORTAL_INTERFACE,
                "AddNotification",
                vec![Value::str(id), record("x")],
            )
            .await
            .expect("add");
        client
            .call(PORTAL_INTERFACE, "RemoveNotification", vec![Value::str(id)])
            .await
            .expect("remove");
        assert_eq!(mock.live_count(), 0);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_key_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, _mock, mut client) = setup(&dir).await;

        let err = client
            .call(
                PORTAL_INTERFACE,
                "RemoveNotification",
                vec![Value::str("nope")],
            )
            .await
            .expect_err("missing id");
        assert!(matches!(err, BusError::Call(e) if e.name == "KeyNotFound"));
    }

    #[tokio::test]
    async fn properties_declare_version_and_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, _mock, mut client) = setup(&dir).await;

        let props = client.get_all(PORTAL_INTERFACE).await.expect("props");
        assert_eq!(props.get("version"), Some(&Value::U32(1)));
        assert_eq!(
            props.get("SupportedOptions"),
            Some(&Value::Dict(BTreeMap::new()))
        );
    }

    #[tokio::test]
    async fn injected_action_invoked_carries_parameters() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, mock, mut client) = setup(&dir).await;

        client.get_all(PORTAL_INTERFACE).await.expect("props");
        mock.emit_action_invoked("(null)-notify-send-1", "bar-action", vec![]);

        let signal = tokio::time::timeout(std::time::Duration::from_secs(5), client.next_signal())
            .await
            .expect("not timed out")
            .expect("signal");
        assert_eq!(signal.member, "ActionInvoked");
        assert_eq!(
            signal.args,
            vec![
                Value::str("(null)-notify-send-1"),
                Value::str("bar-action"),
                Value::Array(vec![]),
            ]
        );
    }
}
