//! Direct-daemon send flow: capability check, `Notify`, then the optional
//! wait loop reacting to daemon signals.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use tokio::signal::unix::{SignalKind, signal};

use notimock_bus::{BusClient, Signal};
use notimock_core::{DIRECT_INTERFACE, Value, direct_list};

use crate::request::{Request, expire_wait, write_fd};

pub async fn run(mut client: BusClient, mut request: Request) -> Result<i32> {
    // Installed before the send so a cancel can never hit the default
    // SIGINT disposition between posting and waiting.
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    let info = client
        .call(DIRECT_INTERFACE, "GetServerInformation", vec![])
        .await
        .context("GetServerInformation failed")?;
    tracing::debug!(?info, "server information");

    let capabilities = fetch_capabilities(&mut client).await?;

    let mut show_error = false;
    if !request.actions.is_empty() && !capabilities.iter().any(|c| c == "actions") {
        eprintln!(
            "Actions are not supported by this notifications server. Displaying non-interactively."
        );
        request.actions.clear();
        show_error = true;
    }

    // An explicit -w still waits even when the actions were refused; the
    // refusal only affects the exit code.
    let wait = request.wait || !request.actions.is_empty();

    let reply = client
        .call(DIRECT_INTERFACE, "Notify", notify_args(&request))
        .await
        .context("Notify failed")?;
    let id = reply
        .first()
        .and_then(Value::as_u32)
        .context("Notify returned no id")?;
    tracing::debug!(id, "notification posted");

    if request.print_id {
        println!("{id}");
    }
    if let Some(fd) = request.id_fd {
        write_fd(fd, &id.to_string()).context("failed to write id fd")?;
    }

    if wait {
        let code = wait_loop(&mut client, &request, id, &mut interrupt).await?;
        return Ok(if show_error { 1 } else { code });
    }

    Ok(if show_error { 1 } else { 0 })
}

async fn fetch_capabilities(client: &mut BusClient) -> Result<Vec<String>> {
    let mut reply = client
        .call(DIRECT_INTERFACE, "GetCapabilities", vec![])
        .await
        .context("GetCapabilities failed")?;
    let caps = match reply.pop() {
        Some(Value::Array(items)) if reply.is_empty() => items,
        _ => bail!("GetCapabilities returned an unexpected shape"),
    };
    Ok(caps
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

fn notify_args(request: &Request) -> Vec<Value> {
    let mut hints: BTreeMap<String, Value> = BTreeMap::new();
    hints.insert("urgency".to_string(), Value::Byte(request.urgency.as_byte()));
    hints.insert(
        "sender-pid".to_string(),
        Value::I32(std::process::id() as i32),
    );
    if let Some(icon) = &request.icon {
        hints.insert("image_path".to_string(), Value::str(icon.clone()));
    }
    if let Some(category) = &request.category {
        hints.insert("category".to_string(), Value::str(category.clone()));
    }
    if request.transient {
        hints.insert("transient".to_string(), Value::Bool(true));
    }
    // Explicit hints win over the flag-derived ones.
    for (name, value) in &request.hints {
        hints.insert(name.clone(), value.clone());
    }

    vec![
        Value::str(request.app_name.clone()),
        Value::U32(request.replace_id),
        Value::str(request.app_icon.clone()),
        Value::str(request.summary.clone()),
        Value::str(request.body.clone()),
        Value::str_array(direct_list(&request.actions)),
        Value::Dict(hints),
        Value::I32(request.expire_time),
    ]
}

async fn wait_loop(
    client: &mut BusClient,
    request: &Request,
    id: u32,
    interrupt: &mut tokio::signal::unix::Signal,
) -> Result<i32> {
    let known: Vec<String> = notimock_core::assign(&request.actions)
        .into_iter()
        .map(|a| a.id)
        .collect();
    let mut activation_token: Option<String> = None;

    // Armed once; ignored signals must not push the deadline out.
    let expire = expire_wait(request.expire_time);
    tokio::pin!(expire);

    loop {
        tokio::select! {
            signal = client.next_signal() => {
                let signal = signal.context("bus closed while waiting")?;
                match handle_signal(client, request, id, &known, &mut activation_token, signal)
                    .await?
                {
                    Some(code) => return Ok(code),
                    None => continue,
                }
            }
            _ = interrupt.recv() => {
                eprintln!("Wait cancelled, closing notification");
                close(client, id).await?;
                return Ok(0);
            }
            _ = &mut expire => {
                eprintln!("Wait timeout expired");
                return Ok(0);
            }
        }
    }
}

/// Returns `Some(exit_code)` when the wait is over.
async fn handle_signal(
    client: &mut BusClient,
    request: &Request,
    id: u32,
    known: &[String],
    activation_token: &mut Option<String>,
    signal: Signal,
) -> Result<Option<i32>> {
    if signal.interface != DIRECT_INTERFACE {
        return Ok(None);
    }
    match (signal.member.as_str(), signal.args.as_slice()) {
        ("ActionInvoked", [sid, Value::Str(action)]) if sid.as_u32() == Some(id) => {
            if !known.iter().any(|k| k == action) {
                eprintln!("Received unknown action {action}");
                return Ok(None);
            }
            if let Some(fd) = request.selected_action_fd {
                write_fd(fd, action).context("failed to write selected action fd")?;
            }
            if let (Some(fd), Some(token)) =
                (request.activation_token_fd, activation_token.as_deref())
            {
                write_fd(fd, token).context("failed to write activation token fd")?;
            }
            println!("{action}");
            close(client, id).await?;
            Ok(Some(0))
        }
        ("ActivationToken", [sid, Value::Str(token)]) if sid.as_u32() == Some(id) => {
            *activation_token = Some(token.clone());
            Ok(None)
        }
        ("NotificationClosed", [sid, ..]) if sid.as_u32() == Some(id) => Ok(Some(0)),
        _ => Ok(None),
    }
}

async fn close(client: &mut BusClient, id: u32) -> Result<()> {
    client
        .call(DIRECT_INTERFACE, "CloseNotification", vec![Value::U32(id)])
        .await
        .context("CloseNotification failed")?;
    Ok(())
}
