//! Child process helpers shared by subprocess-backed providers.
//!
//! A cancelled child first receives a terminate signal and is killed only if
//! it is still alive after the grace period.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TtsError};

/// Time a terminated child gets to exit before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Run `cmd` to completion, feeding `input` on stdin when given.
///
/// Returns `TtsError::Cancelled` if `cancel` fires first; the child is
/// terminated before returning.
pub async fn run_cancellable(
    mut cmd: Command,
    input: Option<Vec<u8>>,
    cancel: &CancellationToken,
) -> Result<Output> {
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let write = async move {
        if let (Some(mut pipe), Some(input)) = (stdin, input) {
            match pipe.write_all(&input).await {
                // The child exited without draining stdin; its status tells why.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
            pipe.shutdown().await.ok();
        }
        Ok::<_, io::Error>(())
    };

    let io = async { tokio::try_join!(write, read_all(stdout), read_all(stderr)) };
    tokio::pin!(io);

    let (stdout, stderr) = tokio::select! {
        result = &mut io => {
            let ((), out, err) = result?;
            (out, err)
        }
        _ = cancel.cancelled() => {
            terminate(&mut child, TERMINATE_GRACE).await;
            return Err(TtsError::Cancelled);
        }
    };

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            terminate(&mut child, TERMINATE_GRACE).await;
            return Err(TtsError::Cancelled);
        }
    };

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Ask the child to exit, escalating to a kill after `grace`.
pub async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            log::debug!("Could not send SIGTERM to {}: {}", pid, e);
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            log::warn!("Child process ignored terminate signal; killing it");
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill child process: {}", e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use std::time::Instant;

    #[tokio::test]
    async fn test_run_collects_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2"]);
        let output = run_cancellable(cmd, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn test_run_feeds_stdin() {
        let cmd = Command::new("cat");
        let output = run_cancellable(cmd, Some(b"pcm bytes".to_vec()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout, b"pcm bytes");
    }

    #[tokio::test]
    async fn test_terminate_sends_sigterm_before_kill() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = Instant::now();
        terminate(&mut child, Duration::from_secs(30)).await;
        assert!(started.elapsed() < Duration::from_secs(5));

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_cancel_terminates_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = run_cancellable(cmd, None, &cancel).await;
        assert!(matches!(result, Err(TtsError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
