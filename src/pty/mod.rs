//! Pseudoterminal (PTY) Shell Backend
//!
//! Runs the shell behind a pseudoterminal so the line discipline echoes each
//! submitted command and merges stdout with stderr.

pub mod process;
pub mod signals;

// Re-exports for convenience
pub use process::{spawn_pty_shell, PtyLauncher, PtyTransport};
pub use signals::{interrupt_process_group, is_process_running};
