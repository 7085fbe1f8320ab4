//! Portal send flow: version check from the declared properties, one
//! `AddNotification` with the portal-shaped record, then the optional wait
//! loop on portal `ActionInvoked`.

use anyhow::{Context, Result, bail};
use tokio::signal::unix::{SignalKind, signal};

use notimock_bus::{BusClient, Signal};
use notimock_core::{PORTAL_INTERFACE, Value, portal_buttons};

use crate::request::{Request, expire_wait, write_fd};

/// Sandboxed callers get their app id from the launcher; the harness passes
/// it through this variable. The original unsandboxed fallback is `(null)`.
const APP_ID_ENV: &str = "NSEND_APP_ID";

pub async fn run(mut client: BusClient, request: Request) -> Result<i32> {
    // Installed before the send so a cancel can never hit the default
    // SIGINT disposition between posting and waiting.
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    let props = client
        .get_all(PORTAL_INTERFACE)
        .await
        .context("portal properties unavailable")?;
    let version = props
        .get("version")
        .and_then(Value::as_u32)
        .context("portal declares no version")?;
    if version < 1 {
        bail!("portal version {version} is not usable");
    }
    tracing::debug!(version, "portal detected");

    // The portal keys notifications by caller-chosen string ids, so replace
    // semantics come from reusing the id rather than a dedicated call.
    let serial = if request.replace_id != 0 {
        request.replace_id
    } else {
        1
    };
    let app_id = std::env::var(APP_ID_ENV).unwrap_or_else(|_| "(null)".to_string());
    let id = format!("{app_id}-notify-send-{serial}");

    client
        .call(
            PORTAL_INTERFACE,
            "AddNotification",
            vec![Value::str(id.clone()), notification_record(&request)],
        )
        .await
        .context("AddNotification failed")?;
    tracing::debug!(%id, "notification posted");

    if request.print_id {
        println!("{serial}");
    }
    if let Some(fd) = request.id_fd {
        write_fd(fd, &serial.to_string()).context("failed to write id fd")?;
    }

    if request.wait || !request.actions.is_empty() {
        return wait_loop(&mut client, &request, &id, &mut interrupt).await;
    }
    Ok(0)
}

/// Build the portal record. Custom `--hint` data has no channel in the
/// portal schema and is dropped.
fn notification_record(request: &Request) -> Value {
    let mut entries = vec![
        ("title".to_string(), Value::str(request.summary.clone())),
        ("body".to_string(), Value::str(request.body.clone())),
        (
            "priority".to_string(),
            Value::str(request.urgency.priority()),
        ),
    ];
    if let Some(icon) = &request.icon {
        entries.push(("icon".to_string(), icon_value(icon)));
    }
    if !request.actions.is_empty() {
        entries.push(("buttons".to_string(), portal_buttons(&request.actions)));
    }
    Value::dict(entries)
}

/// A readable file is shipped inline as `bytes`; anything else is treated
/// as a themed icon name with its `-symbolic` variant.
fn icon_value(icon: &str) -> Value {
    match std::fs::read(icon) {
        Ok(content) => Value::Array(vec![Value::str("bytes"), Value::Bytes(content)]),
        Err(_) => Value::Array(vec![
            Value::str("themed"),
            Value::str_array([icon.to_string(), format!("{icon}-symbolic")]),
        ]),
    }
}

async fn wait_loop(
    client: &mut BusClient,
    request: &Request,
    id: &str,
    interrupt: &mut tokio::signal::unix::Signal,
) -> Result<i32> {
    let known: Vec<String> = notimock_core::assign(&request.actions)
        .into_iter()
        .map(|a| a.id)
        .collect();

    // Armed once; ignored signals must not push the deadline out.
    let expire = expire_wait(request.expire_time);
    tokio::pin!(expire);

    loop {
        tokio::select! {
            signal = client.next_signal() => {
                let signal = signal.context("bus closed while waiting")?;
                if let Some(code) = handle_signal(client, request, id, &known, signal).await? {
                    return Ok(code);
                }
            }
            _ = interrupt.recv() => {
                eprintln!("Wait cancelled, closing notification");
                remove(client, id).await?;
                return Ok(0);
            }
            _ = &mut expire => {
                eprintln!("Wait timeout expired");
                return Ok(0);
            }
        }
    }
}

async fn handle_signal(
    client: &mut BusClient,
    request: &Request,
    id: &str,
    known: &[String],
    signal: Signal,
) -> Result<Option<i32>> {
    if signal.interface != PORTAL_INTERFACE {
        return Ok(None);
    }
    match (signal.member.as_str(), signal.args.as_slice()) {
        ("ActionInvoked", [Value::Str(sid), Value::Str(action), _parameters])
            if sid == id =>
        {
            if !known.iter().any(|k| k == action) {
                eprintln!("Received unknown action {action}");
                return Ok(None);
            }
            if let Some(fd) = request.selected_action_fd {
                write_fd(fd, action).context("failed to write selected action fd")?;
            }
            println!("{action}");
            remove(client, id).await?;
            Ok(Some(0))
        }
        _ => Ok(None),
    }
}

async fn remove(client: &mut BusClient, id: &str) -> Result<()> {
    client
        .call(PORTAL_INTERFACE, "RemoveNotification", vec![Value::str(id)])
        .await
        .context("RemoveNotification failed")?;
    Ok(())
}
