//! Assertion layer: captures the single expected call to a method and
//! compares it field by field against an expected record, reporting every
//! mismatching field, not just the first.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use notimock_core::{Urgency, Value};
use notimock_services::{CallLog, CallRecord};

use crate::error::HarnessError;

/// Fetch the one call to `method` a scenario expects. More or fewer is
/// [`HarnessError::UnexpectedCallCount`].
pub fn single_call(log: &CallLog, method: &str) -> Result<CallRecord, HarnessError> {
    let mut calls = log.calls(method);
    if calls.len() != 1 {
        return Err(HarnessError::UnexpectedCallCount {
            method: method.to_string(),
            count: calls.len(),
        });
    }
    Ok(calls.remove(0))
}

/// Poll until `method` shows up in the log, then apply the single-call
/// rule. The standard synchronization point before injecting a signal: the
/// client records its call before it starts listening, so once the call is
/// visible the injection cannot race the subscription.
pub async fn await_single_call(
    log: &CallLog,
    method: &str,
    bound: Duration,
) -> Result<CallRecord, HarnessError> {
    let deadline = Instant::now() + bound;
    loop {
        if !log.calls(method).is_empty() {
            return single_call(log, method);
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::ChannelTimeout {
                what: format!("a {method} call"),
                seconds: bound.as_secs(),
            });
        }
        sleep(Duration::from_millis(50)).await;
    }
}

fn push_diff(diffs: &mut Vec<String>, field: &str, expected: &Value, actual: Option<&Value>) {
    match actual {
        Some(actual) if actual == expected => {}
        Some(actual) => diffs.push(format!("{field}: expected {expected:?}, got {actual:?}")),
        None => diffs.push(format!("{field}: expected {expected:?}, got nothing")),
    }
}

fn dict_diffs(diffs: &mut Vec<String>, field: &str, expected: &BTreeMap<String, Value>, actual: &Value) {
    let Some(actual) = actual.as_dict() else {
        diffs.push(format!("{field}: expected a dict, got {actual:?}"));
        return;
    };
    for (key, value) in expected {
        match actual.get(key) {
            Some(got) if got == value => {}
            Some(got) => diffs.push(format!("{field}[{key:?}]: expected {value:?}, got {got:?}")),
            None => diffs.push(format!("{field}[{key:?}]: expected {value:?}, missing")),
        }
    }
    for key in actual.keys() {
        if !expected.contains_key(key) {
            diffs.push(format!("{field}[{key:?}]: unexpected entry {:?}", actual[key]));
        }
    }
}

fn finish(diffs: Vec<String>) -> Result<(), HarnessError> {
    if diffs.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::Mismatch(diffs.join("\n")))
    }
}

// ─── Direct form ──────────────────────────────────────────────────

/// Expected shape of a direct `Notify` call. Defaults mirror what the
/// client sends with no flags: app name "notify-send", fresh id, empty
/// icon/body/actions, normal urgency, default expiry.
#[derive(Debug, Clone)]
pub struct NotifyExpectation {
    app_name: String,
    replaces_id: u32,
    app_icon: String,
    summary: String,
    body: String,
    actions: Vec<String>,
    hints: BTreeMap<String, Value>,
    expire_timeout: i32,
}

impl NotifyExpectation {
    /// Defaults for a client running as `pid` (the `sender-pid` hint is
    /// always present).
    pub fn for_sender(pid: i32) -> Self {
        Self {
            app_name: "notify-send".to_string(),
            replaces_id: 0,
            app_icon: String::new(),
            summary: String::new(),
            body: String::new(),
            actions: Vec::new(),
            hints: BTreeMap::from([
                ("urgency".to_string(), Value::Byte(Urgency::Normal.as_byte())),
                ("sender-pid".to_string(), Value::I32(pid)),
            ]),
            expire_timeout: -1,
        }
    }

    #[must_use]
    pub fn app_name(mut self, v: impl Into<String>) -> Self {
        self.app_name = v.into();
        self
    }

    #[must_use]
    pub fn replaces_id(mut self, v: u32) -> Self {
        self.replaces_id = v;
        self
    }

    #[must_use]
    pub fn app_icon(mut self, v: impl Into<String>) -> Self {
        self.app_icon = v.into();
        self
    }

    #[must_use]
    pub fn summary(mut self, v: impl Into<String>) -> Self {
        self.summary = v.into();
        self
    }

    #[must_use]
    pub fn body(mut self, v: impl Into<String>) -> Self {
        self.body = v.into();
        self
    }

    #[must_use]
    pub fn actions<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = v.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn urgency(mut self, v: Urgency) -> Self {
        self.hints
            .insert("urgency".to_string(), Value::Byte(v.as_byte()));
        self
    }

    #[must_use]
    pub fn hint(mut self, key: impl Into<String>, value: Value) -> Self {
        self.hints.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn expire_timeout(mut self, v: i32) -> Self {
        self.expire_timeout = v;
        self
    }

    /// Field-by-field comparison against a captured `Notify` call.
    pub fn check(&self, record: &CallRecord) -> Result<(), HarnessError> {
        if record.args.len() != 8 {
            return Err(HarnessError::Mismatch(format!(
                "Notify: expected 8 arguments, got {}",
                record.args.len()
            )));
        }
        let mut diffs = Vec::new();
        push_diff(&mut diffs, "app_name", &Value::str(&self.app_name), record.args.first());
        push_diff(&mut diffs, "replaces_id", &Value::U32(self.replaces_id), record.args.get(1));
        push_diff(&mut diffs, "app_icon", &Value::str(&self.app_icon), record.args.get(2));
        push_diff(&mut diffs, "summary", &Value::str(&self.summary), record.args.get(3));
        push_diff(&mut diffs, "body", &Value::str(&self.body), record.args.get(4));
        push_diff(
            &mut diffs,
            "actions",
            &Value::str_array(self.actions.iter().cloned()),
            record.args.get(5),
        );
        dict_diffs(&mut diffs, "hints", &self.hints, &record.args[6]);
        push_diff(
            &mut diffs,
            "expire_timeout",
            &Value::I32(self.expire_timeout),
            record.args.get(7),
        );
        finish(diffs)
    }
}

// ─── Portal form ──────────────────────────────────────────────────

/// Expected shape of a portal `AddNotification` call. No defaults: every
/// key of the expected record must be supplied explicitly.
#[derive(Debug, Clone)]
pub struct PortalExpectation {
    id: String,
    record: BTreeMap<String, Value>,
}

impl PortalExpectation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            record: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.record.insert(key.into(), value);
        self
    }

    pub fn check(&self, record: &CallRecord) -> Result<(), HarnessError> {
        if record.args.len() != 2 {
            return Err(HarnessError::Mismatch(format!(
                "AddNotification: expected 2 arguments, got {}",
                record.args.len()
            )));
        }
        let mut diffs = Vec::new();
        push_diff(&mut diffs, "id", &Value::str(&self.id), record.args.first());
        dict_diffs(&mut diffs, "notification", &self.record, &record.args[1]);
        finish(diffs)
    }
}
