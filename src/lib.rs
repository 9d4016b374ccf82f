//! pexe - the core of a floating command launcher
//!
//! pexe forwards typed commands to an interactive shell running in a
//! pseudoterminal and turns the shell's colored output into styled spans
//! for a renderer to draw.
//!
//! ## Module Organization
//!
//! - [`execution`] - Request/response channel over the shell, framed by a
//!   per-request completion marker
//! - [`pty`] - Pseudoterminal backend for the channel (`portable-pty`)
//! - [`ansi`] - SGR escape parser producing [`StyledSpan`]s
//! - [`history`] - Bounded command history with navigation and persistence
//! - [`launcher`] - Input controller combining the three
//! - [`completion`] - Last-argument replacement for completion candidates
//! - [`config`] - Configuration structs and file loading
//! - [`models`] - Shared value types
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use pexe::{init, Launcher};
//! use pexe::launcher::Submission;
//!
//! # async fn run() -> pexe::Result<()> {
//! let config = init()?;
//! let mut launcher = Launcher::from_config(&config)?;
//! launcher.start().await?;
//!
//! if let Submission::Started(pending) = launcher.enter("ls --color=always")? {
//!     for line in pending.wait().await? {
//!         let spans = launcher.render(&line);
//!         println!("{} span(s)", spans.len());
//!     }
//! }
//!
//! launcher.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! Callers drive everything from one async task. Blocking PTY I/O runs on
//! dedicated reader, writer and waiter threads; the reader shares only the
//! mutex-guarded output buffer with the caller.

#[macro_use]
extern crate tracing;

pub mod ansi;
pub mod completion;
pub mod config;
pub mod error;
pub mod execution;
pub mod history;
pub mod launcher;
pub mod models;
pub mod pty;

use std::path::Path;

// Re-exports for core functionality
pub use ansi::{parse_line, Palette, SgrParser};
pub use config::{Config, ConfigLoader};
pub use error::{Error, Result};
pub use execution::{PendingResponse, Progress, ShellChannel};
pub use history::{HistoryError, HistoryRing};
pub use launcher::Launcher;
pub use models::{Color, ShellType, StyledSpan};

// Version information
/// The current version of pexe from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load configuration from the default locations.
///
/// A broken configuration file is reported and replaced by the defaults.
pub fn init() -> Result<Config> {
    info!("Initializing {} v{}", NAME, VERSION);

    let mut loader = ConfigLoader::new();
    match loader.load(None) {
        Ok(config) => {
            if let Some(path) = loader.current_path() {
                info!("Configuration loaded from {}", path.display());
            }
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            Ok(Config::default())
        }
    }
}

/// Load configuration from `path`. Unlike [`init`], errors are returned.
pub fn init_with_config(path: &Path) -> Result<Config> {
    info!("Initializing {} v{} with {}", NAME, VERSION, path.display());
    ConfigLoader::new().load(Some(path))
}
