//! Client process lifecycle: spawn with a mode-selecting environment,
//! capture output without blocking, inject SIGINT, join with bounds.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep, timeout};

use notimock_bus::BUS_ADDRESS_ENV;

use crate::error::HarnessError;

/// Which backend the spawned client is forced to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Direct notification daemon; the portal is ignored.
    Direct,
    /// Sandbox portal.
    Portal,
}

impl BackendMode {
    fn env(self) -> (&'static str, &'static str) {
        match self {
            Self::Direct => ("NOTIFY_IGNORE_PORTAL", "1"),
            Self::Portal => ("NOTIFY_FORCE_PORTAL", "1"),
        }
    }
}

/// Builder for one client invocation.
pub struct ClientCommand {
    program: String,
    bus_address: String,
    mode: BackendMode,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl ClientCommand {
    pub fn new(program: impl Into<String>, bus_address: impl Into<String>, mode: BackendMode) -> Self {
        Self {
            program: program.into(),
            bus_address: bus_address.into(),
            mode,
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra environment for the child, on top of the bus address and the
    /// mode selector.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn spawn(self) -> Result<ClientProcess, HarnessError> {
        let (mode_key, mode_value) = self.mode.env();
        tracing::debug!(program = %self.program, args = ?self.args, mode = ?self.mode, "spawning client");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(BUS_ADDRESS_ENV, &self.bus_address)
            .env(mode_key, mode_value)
            .envs(self.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id().ok_or_else(|| {
            std::io::Error::other("spawned client has no pid")
        })? as i32;

        // Pump captured streams into shared buffers right away so the
        // harness never stalls on a full pipe while the child blocks.
        let stdout = StreamBuffer::pump(child.stdout.take());
        let stderr = StreamBuffer::pump(child.stderr.take());

        Ok(ClientProcess {
            child,
            pid,
            stdout,
            stderr,
            status: None,
        })
    }
}

/// Accumulated output of one captured stream.
#[derive(Clone, Default)]
struct StreamBuffer {
    buf: Arc<Mutex<String>>,
}

impl StreamBuffer {
    fn pump<R>(source: Option<R>) -> Self
    where
        R: AsyncReadExt + Unpin + Send + 'static,
    {
        let buffer = Self::default();
        if let Some(mut source) = source {
            let buf = Arc::clone(&buffer.buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                loop {
                    match source.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let text = String::from_utf8_lossy(&chunk[..n]).into_owned();
                            buf.lock().expect("stream buffer lock").push_str(&text);
                        }
                    }
                }
            });
        }
        buffer
    }

    fn snapshot(&self) -> String {
        self.buf.lock().expect("stream buffer lock").clone()
    }
}

/// A spawned client under test. Killed on drop if still running.
pub struct ClientProcess {
    child: Child,
    pid: i32,
    stdout: StreamBuffer,
    stderr: StreamBuffer,
    status: Option<ExitStatus>,
}

impl ClientProcess {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Captured stdout so far.
    pub fn stdout(&self) -> String {
        self.stdout.snapshot()
    }

    /// Captured stderr so far.
    pub fn stderr(&self) -> String {
        self.stderr.snapshot()
    }

    /// Deliver SIGINT, simulating a user aborting a pending wait.
    pub fn send_sigint(&self) -> Result<(), HarnessError> {
        let rc = unsafe { libc::kill(self.pid, libc::SIGINT) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    pub fn is_running(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Join the client within `bound`.
    pub async fn wait(&mut self, bound: Duration) -> Result<ExitStatus, HarnessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        match timeout(bound, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.status = Some(status);
                Ok(status)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(HarnessError::ChannelTimeout {
                what: "client exit".to_string(),
                seconds: bound.as_secs(),
            }),
        }
    }

    /// Bounded join that tolerates the client staying alive (it may still
    /// be blocking on user interaction).
    pub async fn grace_join(&mut self, bound: Duration) {
        if self.status.is_none()
            && let Ok(Ok(status)) = timeout(bound, self.child.wait()).await
        {
            self.status = Some(status);
        }
    }

    /// Poll captured stderr until `want` shows up, bounded by `bound`.
    pub async fn await_stderr(&mut self, want: &str, bound: Duration) -> Result<String, HarnessError> {
        let deadline = Instant::now() + bound;
        loop {
            let snapshot = self.stderr();
            if let Some(line) = snapshot.lines().find(|l| l.contains(want)) {
                return Ok(line.to_string());
            }
            if !self.is_running() {
                // Pump tasks may still be draining the pipe.
                sleep(Duration::from_millis(50)).await;
                let snapshot = self.stderr();
                return snapshot
                    .lines()
                    .find(|l| l.contains(want))
                    .map(|l| l.to_string())
                    .ok_or(HarnessError::ClientExited {
                        what: format!("{want:?} on stderr"),
                    });
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::ChannelTimeout {
                    what: format!("{want:?} on stderr"),
                    seconds: bound.as_secs(),
                });
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    /// Teardown: terminate if still running and reap. Stream pumps finish
    /// on their own once the pipes close.
    pub async fn shutdown(&mut self) {
        if self.is_running() {
            let _ = self.child.start_kill();
            let _ = timeout(Duration::from_secs(2), self.child.wait()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{FdChannel, await_line};

    fn shell(script: &str) -> ClientCommand {
        // bash, not /bin/sh: dash rejects fd redirections above 9
        // (`>&15` is a syntax error), which the channel test relies on.
        ClientCommand::new("bash", "unused.sock", BackendMode::Direct)
            .arg("-c")
            .arg(script)
    }

    #[tokio::test]
    async fn captures_output_and_exit_status() {
        let mut child = shell("echo out; echo err 1>&2; exit 3")
            .spawn()
            .expect("spawn");
        let status = child.wait(Duration::from_secs(5)).await.expect("join");
        assert_eq!(status.code(), Some(3));
        child.await_stderr("err", Duration::from_secs(5)).await.expect("stderr");
        // Give the stdout pump a beat to drain.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(child.stdout().trim(), "out");
    }

    #[tokio::test]
    async fn channel_receives_line_from_child_fd() {
        let channel = FdChannel::new("proc-test").expect("channel");
        let mut child = shell(&format!("echo bar-action >&{}", channel.child_fd()))
            .spawn()
            .expect("spawn");
        let line = await_line(&channel, &mut child, None, Duration::from_secs(5))
            .await
            .expect("line");
        assert_eq!(line, "bar-action");
    }

    #[tokio::test]
    async fn await_line_times_out_on_silent_child() {
        let channel = FdChannel::new("timeout-test").expect("channel");
        let mut child = shell("sleep 30").spawn().expect("spawn");
        let err = await_line(&channel, &mut child, None, Duration::from_millis(300))
            .await
            .expect_err("timeout");
        assert!(matches!(err, HarnessError::ChannelTimeout { .. }));
        child.shutdown().await;
    }

    #[tokio::test]
    async fn await_line_reports_client_exit() {
        let channel = FdChannel::new("exit-test").expect("channel");
        let mut child = shell("true").spawn().expect("spawn");
        let err = await_line(&channel, &mut child, None, Duration::from_secs(5))
            .await
            .expect_err("exited silently");
        assert!(matches!(err, HarnessError::ClientExited { .. }));
    }

    #[tokio::test]
    async fn sigint_reaches_the_child() {
        let mut child = shell("trap 'exit 0' INT; sleep 30 & wait")
            .spawn()
            .expect("spawn");
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;
        child.send_sigint().expect("kill");
        let status = child.wait(Duration::from_secs(5)).await.expect("join");
        assert_eq!(status.code(), Some(0));
    }
}
