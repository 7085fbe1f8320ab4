//! Validated request model built from the CLI, plus the small helpers the
//! two send flows share.

use std::io::Write;
use std::os::fd::FromRawFd;
use std::time::Duration;

use notimock_core::{ActionSpec, Urgency, Value, parse_hint_arg};

use crate::cli::Cli;

#[derive(Debug)]
pub struct Request {
    pub summary: String,
    pub body: String,
    pub app_name: String,
    pub app_icon: String,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub transient: bool,
    pub urgency: Urgency,
    pub hints: Vec<(String, Value)>,
    pub expire_time: i32,
    pub replace_id: u32,
    pub print_id: bool,
    pub wait: bool,
    pub actions: Vec<ActionSpec>,
    pub id_fd: Option<i32>,
    pub selected_action_fd: Option<i32>,
    pub activation_token_fd: Option<i32>,
}

impl Request {
    /// Validate the parsed CLI. Error strings go to stderr verbatim and
    /// end the run with exit code 1.
    pub fn from_cli(cli: Cli) -> Result<Self, String> {
        let summary = match cli.summary {
            Some(s) if !s.is_empty() => s,
            _ => return Err("No summary specified.".to_string()),
        };

        let urgency: Urgency = cli.urgency.parse().map_err(|e| format!("{e}"))?;

        let mut hints = Vec::new();
        for raw in &cli.hints {
            let hint = parse_hint_arg(raw).map_err(|e| format!("{e}"))?;
            hints.push(hint);
        }

        // An action needs both an id and a label to be displayable.
        let actions: Vec<ActionSpec> = cli
            .actions
            .iter()
            .map(|raw| ActionSpec::parse(raw))
            .filter(|a| !a.label.is_empty() && a.id.as_deref() != Some(""))
            .collect();

        Ok(Self {
            summary,
            body: cli.body.unwrap_or_default(),
            app_name: cli.app_name.unwrap_or_else(|| "notify-send".to_string()),
            app_icon: cli.app_icon.unwrap_or_default(),
            icon: cli.icon,
            category: cli.category,
            transient: cli.transient,
            urgency,
            hints,
            expire_time: cli.expire_time,
            replace_id: cli.replace_id,
            print_id: cli.print_id,
            wait: cli.wait,
            actions,
            id_fd: cli.id_fd,
            selected_action_fd: cli.selected_action_fd,
            activation_token_fd: cli.activation_token_fd,
        })
    }
}

/// Write one line to an inherited descriptor and close it. Each result
/// channel carries exactly one line.
pub fn write_fd(fd: i32, line: &str) -> std::io::Result<()> {
    let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
    writeln!(file, "{line}")?;
    file.flush()
}

/// Completes when a positive expire time elapses; pends forever otherwise.
pub async fn expire_wait(expire_time_ms: i32) {
    if expire_time_ms > 0 {
        tokio::time::sleep(Duration::from_millis(expire_time_ms as u64)).await;
    } else {
        std::future::pending::<()>().await;
    }
}
