//! Error types and Result aliases for pexe

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::history::HistoryError;

/// Result type alias for pexe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pexe
#[derive(Debug)]
pub enum Error {
    // === Execution channel errors ===
    /// A request is already in flight on the channel
    Busy,

    /// The channel has no live shell session
    NotStarted,

    /// `start` was called while a shell session is still alive
    AlreadyStarted,

    /// The shell ended before the completion marker was observed
    ProcessTerminated {
        exit_code: Option<u32>,
    },

    /// Write or read failure on the shell's streams
    Transport {
        reason: String,
    },

    /// The completion marker did not arrive within the configured limit
    ResponseTimeout {
        command: String,
        waited: Duration,
    },

    /// The shell cannot expand completion fragments
    CompletionUnsupported {
        shell: String,
    },

    // === PTY errors ===
    /// Failed to create PTY
    PtyCreationFailed {
        command: String,
        reason: String,
    },

    /// Failed to spawn the shell in the PTY
    CommandSpawnFailed {
        command: String,
        reason: String,
    },

    /// Failed to deliver a signal to the shell
    SignalSendFailed {
        signal: String,
        reason: String,
    },

    // === History errors ===
    /// History navigation or lookup failure
    History(HistoryError),

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// A color string is not `#RRGGBB`
    InvalidColor {
        value: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// JSON errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    /// Generic errors (use sparingly)
    Other(String),
}

impl Error {
    /// Whether the shell behind the channel is gone and a restart is needed
    pub fn needs_restart(&self) -> bool {
        matches!(self, Error::ProcessTerminated { .. } | Error::NotStarted)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Execution channel errors
            Error::Busy => write!(f, "A command is already running"),
            Error::NotStarted => write!(f, "Shell session has not been started"),
            Error::AlreadyStarted => write!(f, "Shell session is already running"),
            Error::ProcessTerminated { exit_code } => match exit_code {
                Some(code) => write!(f, "Shell process terminated with exit code {}", code),
                None => write!(f, "Shell process terminated"),
            },
            Error::Transport { reason } => {
                write!(f, "Shell transport error: {}", reason)
            }
            Error::ResponseTimeout { command, waited } => {
                write!(f, "Command '{}' did not complete within {:?}", command, waited)
            }
            Error::CompletionUnsupported { shell } => {
                write!(f, "Completion is not supported for shell '{}'", shell)
            }

            // PTY errors
            Error::PtyCreationFailed { command, reason } => {
                write!(f, "Failed to create PTY for command '{}': {}", command, reason)
            }
            Error::CommandSpawnFailed { command, reason } => {
                write!(f, "Failed to spawn command '{}': {}", command, reason)
            }
            Error::SignalSendFailed { signal, reason } => {
                write!(f, "Failed to send signal '{}': {}", signal, reason)
            }

            // History errors
            Error::History(err) => write!(f, "History: {}", err),

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::InvalidColor { value } => {
                write!(f, "Invalid color '{}' (expected #RRGGBB)", value)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::History(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Toml(err) => Some(err),
            Error::Regex(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HistoryError> for Error {
    fn from(err: HistoryError) -> Self {
        Error::History(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
