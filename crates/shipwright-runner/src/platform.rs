//! Process-group handling.
//!
//! On Unix the child becomes leader of a fresh process group so that a
//! single `killpg` reaches everything the test suite forked. Elsewhere we can
//! only kill the direct child.

use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

#[cfg(unix)]
pub(crate) fn isolate_process_group(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            // Create a new process group
            libc::setpgid(0, 0);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(raw), signal) {
        // ESRCH just means the group is already gone.
        debug!(pgid, ?signal, %errno, "killpg failed");
    }
}

/// Kill whatever is left in the group after the leader exited on its own.
#[cfg(unix)]
pub(crate) fn sweep_group(pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        signal_group(pgid, nix::sys::signal::Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
pub(crate) fn sweep_group(_pgid: Option<u32>) {}

/// SIGTERM the group, give it `grace` to exit, then SIGKILL and reap.
#[cfg(unix)]
pub(crate) async fn terminate_group(child: &mut Child, pgid: Option<u32>, grace: Duration) {
    use nix::sys::signal::Signal;

    match pgid {
        Some(pgid) => {
            signal_group(pgid, Signal::SIGTERM);
            if tokio::time::timeout(grace, child.wait()).await.is_err() {
                warn!(pgid, "process group ignored SIGTERM, sending SIGKILL");
            }
            signal_group(pgid, Signal::SIGKILL);
        }
        None => {
            let _ = child.start_kill();
        }
    }
    if let Err(err) = child.wait().await {
        debug!(%err, "failed to reap child after termination");
    }
}

#[cfg(not(unix))]
pub(crate) async fn terminate_group(child: &mut Child, _pgid: Option<u32>, grace: Duration) {
    let _ = child.start_kill();
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!("child did not exit after kill");
    }
}
