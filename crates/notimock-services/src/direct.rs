//! Mock of the direct `org.freedesktop.Notifications` daemon. Pure call
//! log plus a configured capability list; no live notification state, the
//! direct contract has no update/remove-by-key semantics to model.

use std::sync::Arc;

use notimock_bus::{BusService, CallError, SignalEmitter};
use notimock_core::{CloseReason, Value};

use crate::call_log::CallLog;

pub use notimock_core::DIRECT_INTERFACE;

/// Capabilities announced by default, matching a stock desktop daemon.
/// Note `actions` is absent; tests opt in.
pub const DEFAULT_CAPABILITIES: &[&str] = &[
    "body",
    "body-markup",
    "icon-static",
    "image/svg+xml",
    "private-synchronous",
    "append",
    "private-icon-only",
    "truncation",
];

pub struct DirectServiceMock {
    capabilities: Vec<String>,
    /// Id returned by `Notify` when the caller is not replacing.
    reply_id: u32,
    log: CallLog,
    emitter: SignalEmitter,
}

impl DirectServiceMock {
    pub fn new(emitter: SignalEmitter, capabilities: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            reply_id: 1,
            log: CallLog::new(),
            emitter,
        })
    }

    pub fn default_capabilities() -> Vec<String> {
        DEFAULT_CAPABILITIES.iter().map(|s| s.to_string()).collect()
    }

    /// Default capabilities plus `actions`.
    pub fn capabilities_with_actions() -> Vec<String> {
        let mut caps = Self::default_capabilities();
        caps.push("actions".to_string());
        caps
    }

    pub fn call_log(&self) -> &CallLog {
        &self.log
    }

    // ── Harness-only signal injection ─────────────────────────────

    pub fn emit_action_invoked(&self, id: u32, action: &str) {
        self.emitter.emit(
            DIRECT_INTERFACE,
            "ActionInvoked",
            vec![Value::U32(id), Value::str(action)],
        );
    }

    pub fn emit_notification_closed(&self, id: u32, reason: CloseReason) {
        self.emitter.emit(
            DIRECT_INTERFACE,
            "NotificationClosed",
            vec![Value::U32(id), Value::U32(reason.as_u32())],
        );
    }

    pub fn emit_activation_token(&self, id: u32, token: &str) {
        self.emitter.emit(
            DIRECT_INTERFACE,
            "ActivationToken",
            vec![Value::U32(id), Value::str(token)],
        );
    }
}

impl BusService for DirectServiceMock {
    fn interface(&self) -> &str {
        DIRECT_INTERFACE
    }

    fn handle_call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>, CallError> {
        match method {
            "GetCapabilities" => {
                let caps = Value::str_array(self.capabilities.iter().cloned());
                self.log.record(method, args.to_vec(), Some(caps.clone()));
                Ok(vec![caps])
            }
            "GetServerInformation" => {
                let info = vec![
                    Value::str("notimock"),
                    Value::str("notimock"),
                    Value::str(env!("CARGO_PKG_VERSION")),
                    Value::str("1.2"),
                ];
                self.log.record(method, args.to_vec(), None);
                Ok(info)
            }
            "Notify" => {
                if args.len() != 8 {
                    return Err(CallError::invalid_args(method));
                }
                let replaces_id = args[1]
                    .as_u32()
                    .ok_or_else(|| CallError::invalid_args(method))?;
                let id = if replaces_id != 0 {
                    replaces_id
                } else {
                    self.reply_id
                };
                self.log.record(method, args.to_vec(), Some(Value::U32(id)));
                Ok(vec![Value::U32(id)])
            }
            "CloseNotification" => {
                let id = args
                    .first()
                    .and_then(Value::as_u32)
                    .ok_or_else(|| CallError::invalid_args(method))?;
                self.log.record(method, args.to_vec(), None);
                self.emit_notification_closed(id, CloseReason::ClosedByCaller);
                Ok(vec![])
            }
            _ => Err(CallError::unknown_method(DIRECT_INTERFACE, method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notimock_bus::{Broker, BusClient};

    async fn setup(dir: &tempfile::TempDir) -> (Broker, Arc<DirectServiceMock>, BusClient) {
        let socket = dir.path().join("bus.sock").to_string_lossy().into_owned();
        let broker = Broker::start(&socket).await.expect("broker");
        let mock = DirectServiceMock::new(
            broker.emitter(),
            DirectServiceMock::default_capabilities(),
        );
        broker.register(mock.clone());
        let client = BusClient::connect(&socket).await.expect("connect");
        (broker, mock, client)
    }

    fn notify_args(replaces_id: u32) -> Vec<Value> {
        vec![
            Value::str("notify-send"),
            Value::U32(replaces_id),
            Value::str(""),
            Value::str("title"),
            Value::str("body"),
            Value::str_array(Vec::<String>::new()),
            Value::dict([("urgency", Value::Byte(1))]),
            Value::I32(-1),
        ]
    }

    #[tokio::test]
    async fn notify_returns_fixed_id_and_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, mock, mut client) = setup(&dir).await;

        let result = client
            .call(DIRECT_INTERFACE, "Notify", notify_args(0))
            .await
            .expect("notify");
        assert_eq!(result, vec![Value::U32(1)]);

        let calls = mock.call_log().calls("Notify");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args[3], Value::str("title"));
        assert_eq!(calls[0].ret, Some(Value::U32(1)));
    }

    #[tokio::test]
    async fn notify_honors_replaces_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, _mock, mut client) = setup(&dir).await;

        let result = client
            .call(DIRECT_INTERFACE, "Notify", notify_args(1234))
            .await
            .expect("notify");
        assert_eq!(result, vec![Value::U32(1234)]);
    }

    #[tokio::test]
    async fn close_notification_emits_closed_signal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, _mock, mut client) = setup(&dir).await;

        client
            .call(DIRECT_INTERFACE, "CloseNotification", vec![Value::U32(7)])
            .await
            .expect("close");
        let signal = tokio::time::timeout(std::time::Duration::from_secs(5), client.next_signal())
            .await
            .expect("not timed out")
            .expect("signal");
        assert_eq!(signal.member, "NotificationClosed");
        assert_eq!(
            signal.args,
            vec![Value::U32(7), Value::U32(CloseReason::ClosedByCaller.as_u32())]
        );
    }

    #[tokio::test]
    async fn capabilities_and_server_information() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, mock, mut client) = setup(&dir).await;

        let caps = client
            .call(DIRECT_INTERFACE, "GetCapabilities", vec![])
            .await
            .expect("caps");
        assert_eq!(
            caps,
            vec![Value::str_array(DEFAULT_CAPABILITIES.iter().copied())]
        );

        let info = client
            .call(DIRECT_INTERFACE, "GetServerInformation", vec![])
            .await
            .expect("info");
        assert_eq!(info.len(), 4);
        assert_eq!(mock.call_log().len(), 2);
    }

    #[tokio::test]
    async fn injected_action_invoked_reaches_client() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_broker, mock, mut client) = setup(&dir).await;

        client
            .call(DIRECT_INTERFACE, "Notify", notify_args(0))
            .await
            .expect("notify");
        mock.emit_action_invoked(1, "bar-action");

        let signal = tokio::time::timeout(std::time::Duration::from_secs(5), client.next_signal())
            .await
            .expect("not timed out")
            .expect("signal");
        assert_eq!(signal.member, "ActionInvoked");
        assert_eq!(signal.args, vec![Value::U32(1), Value::str("bar-action")]);
    }
}
