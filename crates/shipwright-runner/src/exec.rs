use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use shipwright_utils::CancellationToken;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tracing::{debug, warn};

use crate::platform;
use crate::{CommandSpec, RingBuffer, RunnerError};

/// How long to keep draining pipes after the leader has exited.
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Resource limits for one subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Wall-clock limit for the whole process tree.
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL when tearing the group down.
    pub kill_grace: Duration,
    /// Bytes of stdout and of stderr retained (each).
    pub output_cap: usize,
}

impl ExecLimits {
    pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);
    pub const DEFAULT_OUTPUT_CAP: usize = 256 * 1024;

    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            kill_grace: Self::DEFAULT_KILL_GRACE,
            output_cap: Self::DEFAULT_OUTPUT_CAP,
        }
    }

    #[must_use]
    pub const fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_output_cap(mut self, cap: usize) -> Self {
        self.output_cap = cap;
        self
    }
}

/// Captured result of a subprocess that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; on Unix a signal death is reported as `128 + signo`.
    pub exit_code: Option<i32>,
    /// Signal that terminated the leader, if it did not exit on its own.
    pub signal: Option<i32>,
    pub duration: Duration,
    pub truncated: bool,
}

impl ProcessOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, the order test runners are usually read in.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        out.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

enum Finish {
    Exited(ExitStatus),
    Failed(io::Error),
    TimedOut,
    Cancelled,
}

/// Run `spec` to completion under `limits`.
///
/// `input`, when given, is written to the child's stdin and the pipe is then
/// closed. On timeout or cancellation the child's process group is torn down
/// before this returns, so no process started here outlives the call.
pub async fn run_bounded(
    spec: &CommandSpec,
    input: Option<&[u8]>,
    limits: &ExecLimits,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, RunnerError> {
    if cancel.is_cancelled() {
        return Err(RunnerError::Cancelled);
    }

    let program = spec.display();
    let mut cmd = spec.to_tokio_command();
    if input.is_some() {
        cmd.stdin(Stdio::piped());
    }
    platform::isolate_process_group(&mut cmd);

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|e| RunnerError::Spawn {
        program: program.clone(),
        reason: e.to_string(),
    })?;
    let pgid = child.id();
    debug!(command = %program, pid = ?pgid, "spawned subprocess");

    if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
        let data = data.to_vec();
        tokio::spawn(async move {
            if let Err(err) = stdin.write_all(&data).await {
                debug!(%err, "child closed stdin early");
            }
        });
    }

    let mut stdout_buf = RingBuffer::new(limits.output_cap);
    let mut stderr_buf = RingBuffer::new(limits.output_cap);

    let finish = {
        let supervised = tokio::time::timeout(
            limits.timeout,
            supervise(&mut child, pgid, &mut stdout_buf, &mut stderr_buf),
        );
        tokio::select! {
            res = supervised => match res {
                Ok(Ok(status)) => Finish::Exited(status),
                Ok(Err(err)) => Finish::Failed(err),
                Err(_) => Finish::TimedOut,
            },
            () = cancel.cancelled() => Finish::Cancelled,
        }
    };

    match finish {
        Finish::Exited(status) => {
            let output = ProcessOutput {
                stdout: stdout_buf.to_string(),
                stderr: stderr_buf.to_string(),
                exit_code: exit_code(status),
                signal: term_signal(status),
                duration: started.elapsed(),
                truncated: stdout_buf.was_truncated() || stderr_buf.was_truncated(),
            };
            debug!(
                command = %program,
                exit_code = ?output.exit_code,
                duration_ms = output.duration.as_millis() as u64,
                "subprocess finished"
            );
            Ok(output)
        }
        Finish::Failed(err) => {
            platform::terminate_group(&mut child, pgid, limits.kill_grace).await;
            Err(RunnerError::Io {
                program,
                reason: err.to_string(),
            })
        }
        Finish::TimedOut => {
            warn!(command = %program, timeout = ?limits.timeout, "subprocess timed out, killing process group");
            platform::terminate_group(&mut child, pgid, limits.kill_grace).await;
            Err(RunnerError::Timeout {
                timeout: limits.timeout,
            })
        }
        Finish::Cancelled => {
            warn!(command = %program, "cancellation requested, killing process group");
            platform::terminate_group(&mut child, pgid, limits.kill_grace).await;
            Err(RunnerError::Cancelled)
        }
    }
}

/// Pump both pipes until the leader exits, then sweep the group and drain.
async fn supervise(
    child: &mut Child,
    pgid: Option<u32>,
    out: &mut RingBuffer,
    err: &mut RingBuffer,
) -> io::Result<ExitStatus> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out_chunk = [0u8; 8192];
    let mut err_chunk = [0u8; 8192];

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            read = read_some(&mut stdout, &mut out_chunk), if stdout.is_some() => match read? {
                0 => stdout = None,
                n => out.write(&out_chunk[..n]),
            },
            read = read_some(&mut stderr, &mut err_chunk), if stderr.is_some() => match read? {
                0 => stderr = None,
                n => err.write(&err_chunk[..n]),
            },
        }
    };

    // Background children may still hold the pipes open.
    platform::sweep_group(pgid);
    let drained = tokio::time::timeout(DRAIN_LIMIT, async {
        drain(&mut stdout, out).await;
        drain(&mut stderr, err).await;
    })
    .await;
    if drained.is_err() {
        debug!("gave up draining pipes after leader exit");
    }

    Ok(status)
}

async fn read_some<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: &mut Option<R>, sink: &mut RingBuffer) {
    let Some(r) = reader.as_mut() else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match r.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.write(&chunk[..n]),
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|sig| 128 + sig))
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

#[cfg(unix)]
fn term_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn term_signal(_status: ExitStatus) -> Option<i32> {
    None
}
