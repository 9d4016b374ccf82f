//! Shell Transport Seam
//!
//! The channel talks to the shell only through these traits. The PTY backend
//! lives in [`crate::pty`]; tests plug in scripted shells.

use async_trait::async_trait;
use std::time::Duration;

use super::accumulator::OutputSink;
use crate::config::ShellConfig;
use crate::error::Result;

/// Input side and lifecycle control of a running shell
#[async_trait]
pub trait ShellTransport: Send {
    /// Queue bytes for the shell's input
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Interrupt the foreground job. Best effort.
    fn interrupt(&mut self) -> Result<()>;

    /// Close input, give the shell `grace` to exit, then kill it
    async fn shutdown(&mut self, grace: Duration) -> Result<()>;

    /// OS process id of the shell, when known
    fn process_id(&self) -> Option<u32> {
        None
    }
}

/// Starts shells whose output is delivered to an [`OutputSink`]
#[async_trait]
pub trait ShellLauncher: Send + Sync {
    async fn launch(&self, shell: &ShellConfig, sink: OutputSink) -> Result<Box<dyn ShellTransport>>;
}
