//! Configuration management for pexe
//!
//! Every component receives its settings through these structs from the
//! composition root; nothing reads configuration globally. Files are TOML or
//! JSON, and any section or field left out takes its default.

pub mod loader;

pub use loader::{ConfigFormat, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ansi::palette::{Palette, CAMPBELL_BRIGHT, CAMPBELL_NORMAL};
use crate::error::{Error, Result};
use crate::models::{Color, ShellType};

/// Main configuration structure for pexe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell process settings
    pub shell: ShellConfig,

    /// Execution channel timing
    pub channel: ChannelConfig,

    /// Command history settings
    pub history: HistoryConfig,

    /// Output colors
    pub palette: PaletteConfig,
}

impl Config {
    /// Check every section, reporting the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.shell.program.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(invalid("shell.program", "Shell program cannot be empty"));
        }
        if self.shell.columns == 0 {
            return Err(invalid("shell.columns", "Columns must be greater than 0"));
        }
        if self.shell.rows == 0 {
            return Err(invalid("shell.rows", "Rows must be greater than 0"));
        }

        if self.channel.poll_interval_ms == 0 {
            return Err(invalid(
                "channel.poll_interval_ms",
                "Poll interval must be greater than 0",
            ));
        }
        if self.channel.startup_timeout_ms == 0 {
            return Err(invalid(
                "channel.startup_timeout_ms",
                "Startup timeout must be greater than 0",
            ));
        }

        if self.history.capacity == 0 {
            return Err(invalid(
                "history.capacity",
                "History capacity must be greater than 0",
            ));
        }

        self.palette.to_palette().map(|_| ())
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::ConfigValidationFailed {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Shell process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell dialect; detected from `program` when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ShellType>,

    /// Shell executable; `$SHELL` or the platform default when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Shell arguments; per-shell defaults when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Directory the shell starts in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Terminal width, in columns
    pub columns: u16,

    /// Terminal height, in rows
    pub rows: u16,

    /// Extra environment for the shell
    pub env: HashMap<String, String>,

    /// Commands run once after startup; per-shell defaults when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_commands: Option<Vec<String>>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let mut env = HashMap::new();
        env.insert("TERM".to_string(), "xterm-256color".to_string());

        Self {
            kind: None,
            program: None,
            args: None,
            working_directory: None,
            columns: 80,
            rows: 24,
            env,
            init_commands: None,
        }
    }
}

impl ShellConfig {
    /// Executable to launch
    pub fn program(&self) -> String {
        self.program.clone().unwrap_or_else(default_shell_program)
    }

    /// Dialect used for framing, prompt setup and completion
    pub fn shell_type(&self) -> ShellType {
        self.kind
            .or_else(|| ShellType::detect(Path::new(&self.program())))
            .unwrap_or(ShellType::Sh)
    }

    pub fn args(&self) -> Vec<String> {
        self.args
            .clone()
            .unwrap_or_else(|| self.shell_type().default_args())
    }

    pub fn init_commands(&self) -> Vec<String> {
        self.init_commands
            .clone()
            .unwrap_or_else(|| self.shell_type().default_init_commands())
    }
}

#[cfg(windows)]
fn default_shell_program() -> String {
    "pwsh.exe".to_string()
}

#[cfg(not(windows))]
fn default_shell_program() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.trim().is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

/// Execution channel timing, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Interval between checks for the completion marker
    pub poll_interval_ms: u64,

    /// Limit on a single response; 0 waits indefinitely
    pub response_timeout_ms: u64,

    /// Limit on each startup step
    pub startup_timeout_ms: u64,

    /// Time the shell gets to exit on stop before it is killed
    pub shutdown_grace_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            response_timeout_ms: 0,
            startup_timeout_ms: 10_000,
            shutdown_grace_ms: 500,
        }
    }
}

impl ChannelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Command history configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained commands
    pub capacity: usize,

    /// History file; under the user data directory when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            path: None,
        }
    }
}

impl HistoryConfig {
    /// History file location, if one can be determined
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("pexe").join("history.txt")))
    }
}

/// Output colors as `#RRGGBB` strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    /// Default text color
    pub foreground: String,

    /// Default background color
    pub background: String,

    /// Black, red, green, yellow, blue, magenta, cyan, white
    pub normal: Vec<String>,

    /// Bright variants of `normal`
    pub bright: Vec<String>,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        let defaults = Palette::default();
        Self {
            foreground: defaults.foreground.to_hex(),
            background: defaults.background.to_hex(),
            normal: CAMPBELL_NORMAL.iter().map(Color::to_hex).collect(),
            bright: CAMPBELL_BRIGHT.iter().map(Color::to_hex).collect(),
        }
    }
}

impl PaletteConfig {
    /// Resolve into the palette used by the SGR parser
    pub fn to_palette(&self) -> Result<Palette> {
        Ok(Palette {
            foreground: parse_color("palette.foreground", &self.foreground)?,
            background: parse_color("palette.background", &self.background)?,
            normal: parse_table("palette.normal", &self.normal)?,
            bright: parse_table("palette.bright", &self.bright)?,
        })
    }
}

fn parse_color(field: &str, value: &str) -> Result<Color> {
    Color::from_hex(value).map_err(|e| invalid(field, &e.to_string()))
}

fn parse_table(field: &str, values: &[String]) -> Result<[Color; 8]> {
    if values.len() != 8 {
        return Err(invalid(
            field,
            &format!("Expected 8 colors, found {}", values.len()),
        ));
    }

    let mut table = [Color::new(0, 0, 0); 8];
    for (slot, value) in table.iter_mut().zip(values) {
        *slot = parse_color(field, value)?;
    }
    Ok(table)
}
