//! Signal Delivery
//!
//! Interrupting a shell happens on two paths: the ETX control byte written to
//! the terminal, which the line discipline turns into SIGINT for the
//! foreground job, and on Unix an explicit SIGINT to the foreground process
//! group.

use crate::error::{Error, Result};

/// Ctrl-C
pub const ETX: u8 = 0x03;

/// Ctrl-D, end of input at an empty prompt
pub const EOT: u8 = 0x04;

/// Send SIGINT to every process in group `pgid`
#[cfg(unix)]
pub fn interrupt_process_group(pgid: i32) -> Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pgid), Signal::SIGINT).map_err(|e| Error::SignalSendFailed {
        signal: "SIGINT".to_string(),
        reason: e.to_string(),
    })
}

/// Windows has no process groups to signal; the console receives ETX instead
#[cfg(not(unix))]
pub fn interrupt_process_group(_pgid: i32) -> Result<()> {
    Err(Error::SignalSendFailed {
        signal: "SIGINT".to_string(),
        reason: "process group signals are not available on this platform".to_string(),
    })
}

/// Whether a process with `pid` exists
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(pid) => kill(Pid::from_raw(pid), None).is_ok(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    true
}
