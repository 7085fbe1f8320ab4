//! Out-of-band file-descriptor channels: a temp-file-backed one-shot
//! handoff. The harness creates the file empty, hands the child an
//! inheritable descriptor, and polls for the single line the child writes
//! when its event resolves.

use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::time::{Instant, sleep};

use crate::error::HarnessError;
use crate::process::ClientProcess;

/// Poll cadence for channel and stream waits.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period granted to the child after a channel hit, to collect
/// remaining output without requiring full exit.
const GRACE_JOIN: Duration = Duration::from_millis(500);

/// A single-writer/single-reader channel backed by a named temp file.
///
/// The descriptor exposed by [`child_fd`](Self::child_fd) is a dup with
/// close-on-exec cleared, so a spawned child inherits it; the child is told
/// the number via a `--*-fd=` flag. Both the dup and the backing file are
/// released on drop, on every exit path.
pub struct FdChannel {
    file: NamedTempFile,
    child_fd: i32,
}

impl FdChannel {
    pub fn new(prefix: &str) -> Result<Self, HarnessError> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".channel")
            .tempfile()?;
        // dup() clears FD_CLOEXEC on the copy, which is exactly what makes
        // the descriptor survive exec into the child.
        let child_fd = unsafe { libc::dup(file.as_file().as_raw_fd()) };
        if child_fd < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(Self { file, child_fd })
    }

    /// Descriptor number the child will inherit.
    pub fn child_fd(&self) -> i32 {
        self.child_fd
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Entire channel contents so far. Used for emptiness assertions after
    /// the client is gone.
    pub async fn read_all(&self) -> Result<String, HarnessError> {
        Ok(tokio::fs::read_to_string(self.path()).await?)
    }

    fn first_line(contents: &str, want: Option<&str>) -> Option<String> {
        contents
            .lines()
            .find(|line| {
                let line = line.trim();
                !line.is_empty() && want.is_none_or(|w| line.contains(w))
            })
            .map(|line| line.trim().to_string())
    }
}

impl Drop for FdChannel {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.child_fd);
        }
    }
}

/// Poll `channel` until a non-empty line (containing `want`, when given)
/// appears, the child exits, or `timeout` elapses.
///
/// On a hit the child gets a short bounded grace join so trailing output is
/// collected. Exceeding `timeout` is [`HarnessError::ChannelTimeout`], a
/// harness failure, never an indefinite hang.
pub async fn await_line(
    channel: &FdChannel,
    child: &mut ClientProcess,
    want: Option<&str>,
    timeout: Duration,
) -> Result<String, HarnessError> {
    let what = match want {
        Some(w) => format!("{w:?} on {}", channel.path().display()),
        None => format!("a line on {}", channel.path().display()),
    };
    let deadline = Instant::now() + timeout;

    loop {
        let contents = channel.read_all().await?;
        if let Some(line) = FdChannel::first_line(&contents, want) {
            child.grace_join(GRACE_JOIN).await;
            return Ok(line);
        }
        if !child.is_running() {
            // Last look: the write may have landed right before exit.
            let contents = channel.read_all().await?;
            return FdChannel::first_line(&contents, want)
                .ok_or(HarnessError::ClientExited { what });
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::ChannelTimeout {
                what,
                seconds: timeout.as_secs(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn child_fd_is_inheritable_and_writable() {
        let channel = FdChannel::new("test-channel").expect("channel");
        let fd = channel.child_fd();
        assert!(fd >= 0);

        // FD_CLOEXEC must be clear, otherwise the child loses the fd.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        assert_eq!(flags & libc::FD_CLOEXEC, 0);

        // Writing through the dup (as the child would) lands in the file.
        let dup = unsafe { libc::dup(fd) };
        assert!(dup >= 0);
        let mut file = unsafe { <std::fs::File as std::os::fd::FromRawFd>::from_raw_fd(dup) };
        writeln!(file, "bar-action").expect("write");
        drop(file);

        let contents = std::fs::read_to_string(channel.path()).expect("read");
        assert_eq!(contents.trim(), "bar-action");
    }

    #[test]
    fn first_line_matching() {
        assert_eq!(
            FdChannel::first_line("\nbar-action\n", None),
            Some("bar-action".to_string())
        );
        assert_eq!(FdChannel::first_line("   \n", None), None);
        assert_eq!(
            FdChannel::first_line("noise\ntoken-7\n", Some("token")),
            Some("token-7".to_string())
        );
        assert_eq!(FdChannel::first_line("noise\n", Some("token")), None);
    }
}
