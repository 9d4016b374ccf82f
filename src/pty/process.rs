//! PTY Shell Processes
//!
//! Spawns the shell inside a pseudoterminal with portable-pty. Blocking PTY
//! I/O runs on background threads: a reader feeding the output sink, a
//! writer draining an input queue, and a waiter recording the exit status.

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::mpsc::{channel, Sender};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use super::signals;
use super::signals::{EOT, ETX};
use crate::config::ShellConfig;
use crate::error::{Error, Result};
use crate::execution::{OutputSink, ShellLauncher, ShellTransport};

/// Interval between exit checks while waiting out the shutdown grace period
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Launches shells in a native pseudoterminal
#[derive(Debug, Clone, Copy, Default)]
pub struct PtyLauncher;

impl PtyLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ShellLauncher for PtyLauncher {
    async fn launch(&self, shell: &ShellConfig, sink: OutputSink) -> Result<Box<dyn ShellTransport>> {
        let transport = spawn_pty_shell(shell, sink)?;
        Ok(Box::new(transport))
    }
}

/// A shell running in a pseudoterminal
pub struct PtyTransport {
    master: Box<dyn MasterPty + Send>,
    input: Option<Sender<Vec<u8>>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    sink: OutputSink,
}

/// Spawn the configured shell in a new PTY sized to the output columns
pub fn spawn_pty_shell(shell: &ShellConfig, sink: OutputSink) -> Result<PtyTransport> {
    let program = shell.program();
    let pty_system = native_pty_system();

    let pair = pty_system
        .openpty(PtySize {
            rows: shell.rows,
            cols: shell.columns,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::PtyCreationFailed {
            command: program.clone(),
            reason: e.to_string(),
        })?;

    let mut cmd_builder = CommandBuilder::new(&program);
    cmd_builder.args(shell.args());
    for (key, value) in &shell.env {
        cmd_builder.env(key, value);
    }
    if let Some(dir) = &shell.working_directory {
        cmd_builder.cwd(dir);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd_builder)
        .map_err(|e| Error::CommandSpawnFailed {
            command: program.clone(),
            reason: e.to_string(),
        })?;
    // The reader only sees EOF once no slave handle is left open here
    drop(pair.slave);

    let pid = child.process_id();
    let killer = child.clone_killer();
    debug!("Spawned '{}' in PTY (pid {:?})", program, pid);

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::Transport {
            reason: format!("failed to clone PTY reader: {}", e),
        })?;
    let mut writer = pair.master.take_writer().map_err(|e| Error::Transport {
        reason: format!("failed to take PTY writer: {}", e),
    })?;

    // Reader thread: PTY output -> accumulator
    let reader_sink = sink.clone();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY read EOF");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    reader_sink.push(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    // Linux reports EIO once the shell side of the PTY is gone
                    if reader_sink.is_exited() {
                        debug!("PTY read ended after shell exit: {}", e);
                        break;
                    }
                    consecutive_errors += 1;
                    warn!(
                        "PTY read error ({}): {} (attempt {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_ERRORS
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("PTY read: too many consecutive errors, stopping reader thread");
                        break;
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
        reader_sink.close();
        debug!("PTY reader thread exiting");
    });

    // Writer thread: input queue -> PTY
    let (tx_input, rx_input) = channel::<Vec<u8>>();
    let writer_sink = sink.clone();
    thread::spawn(move || {
        while let Ok(data) = rx_input.recv() {
            if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
                error!("PTY write error ({}): {}", e.kind(), e);
                writer_sink.fail(format!("write to shell failed: {}", e));
                break;
            }
        }
        debug!("PTY writer thread exiting");
    });

    // Waiter thread: exit status -> accumulator
    let waiter_sink = sink.clone();
    thread::spawn(move || {
        match child.wait() {
            Ok(status) => {
                info!("Shell exited with code {}", status.exit_code());
                waiter_sink.mark_exited(Some(status.exit_code()));
            }
            Err(e) => {
                warn!("Failed to wait for shell: {}", e);
                waiter_sink.mark_exited(None);
            }
        }
    });

    Ok(PtyTransport {
        master: pair.master,
        input: Some(tx_input),
        killer,
        pid,
        sink,
    })
}

impl PtyTransport {
    /// Process group currently in the foreground of the terminal
    #[cfg(unix)]
    fn foreground_group(&self) -> Option<i32> {
        self.master
            .process_group_leader()
            .or_else(|| self.pid.and_then(|pid| i32::try_from(pid).ok()))
    }
}

#[async_trait]
impl ShellTransport for PtyTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let input = self.input.as_ref().ok_or_else(|| Error::Transport {
            reason: "shell input is closed".to_string(),
        })?;
        input.send(data.to_vec()).map_err(|_| Error::Transport {
            reason: "PTY writer thread has stopped".to_string(),
        })
    }

    fn interrupt(&mut self) -> Result<()> {
        let written = self.send(&[ETX]);

        #[cfg(unix)]
        if let Some(group) = self.foreground_group() {
            signals::interrupt_process_group(group)?;
        }

        written
    }

    async fn shutdown(&mut self, grace: Duration) -> Result<()> {
        if let Some(input) = self.input.take() {
            if input.send(vec![EOT]).is_err() {
                debug!("PTY writer already stopped during shutdown");
            }
        }

        let deadline = Instant::now() + grace;
        while !self.sink.is_exited() && Instant::now() < deadline {
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }

        if !self.sink.is_exited() {
            debug!("Shell still running after {:?}, killing", grace);
            self.killer.kill().map_err(|e| Error::SignalSendFailed {
                signal: "Kill".to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PtyTransport {
    fn drop(&mut self) {
        if !self.sink.is_exited() {
            if let Err(e) = self.killer.kill() {
                debug!("Failed to kill shell on drop: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for PtyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyTransport")
            .field("pid", &self.pid)
            .field("input_open", &self.input.is_some())
            .finish()
    }
}
