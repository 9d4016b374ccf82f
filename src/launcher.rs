//! Launcher Input Controller
//!
//! The non-visual half of the launcher's input box. It records entered
//! commands in history, recognizes the built-in `exit` and `term` commands,
//! forwards everything else to the shell channel, and turns shell output
//! into styled spans for the renderer.

use crate::ansi::{Palette, SgrParser};
use crate::completion::{common_prefix, Completer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::execution::{PendingResponse, ShellChannel};
use crate::history::HistoryRing;
use crate::models::StyledSpan;

/// Built-in command that closes the launcher
const EXIT_COMMAND: &str = "exit";

/// Built-in command that interrupts the running shell command
const TERM_COMMAND: &str = "term";

/// Outcome of entering a line
#[derive(Debug)]
pub enum Submission {
    /// Nothing was sent: the input was empty or the shell is busy
    Ignored,
    /// The user asked to close the launcher
    Exit,
    /// The running command was interrupted
    Interrupted,
    /// The command was sent; the handle yields its output
    Started(PendingResponse),
}

/// Outcome of a completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The shell offered nothing
    NoCandidates,
    /// A single candidate, already applied to the input
    Replaced(String),
    /// Several candidates to choose from
    Candidates {
        candidates: Vec<String>,
        /// Prefix shared by every candidate, when there is one
        common: Option<String>,
    },
}

/// Input controller tying history, the shell channel and the SGR parser
#[derive(Debug)]
pub struct Launcher {
    channel: ShellChannel,
    history: HistoryRing,
    parser: SgrParser,
    completer: Completer,
}

impl Launcher {
    pub fn new(channel: ShellChannel, history: HistoryRing, palette: Palette) -> Result<Self> {
        Ok(Self {
            channel,
            history,
            parser: SgrParser::new(palette),
            completer: Completer::new()?,
        })
    }

    /// Build a PTY-backed launcher with history loaded from its file
    pub fn from_config(config: &Config) -> Result<Self> {
        let history = match config.history.resolved_path() {
            Some(path) => HistoryRing::open(config.history.capacity, path)?,
            None => {
                warn!("No history file location available; history will not persist");
                HistoryRing::new(config.history.capacity)?
            }
        };
        let palette = config.palette.to_palette()?;
        Self::new(ShellChannel::from_config(config), history, palette)
    }

    pub fn channel(&self) -> &ShellChannel {
        &self.channel
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Palette used by [`Launcher::render`]
    pub fn palette(&self) -> &Palette {
        self.parser.palette()
    }

    /// Start the shell
    pub async fn start(&mut self) -> Result<()> {
        self.channel.start().await
    }

    /// Stop the current shell and start a new one
    pub async fn restart(&mut self) -> Result<()> {
        info!("Restarting shell");
        if let Err(e) = self.channel.stop().await {
            warn!("Error stopping shell before restart: {}", e);
        }
        self.channel.start().await
    }

    /// Handle an entered line
    pub fn enter(&mut self, input: &str) -> Result<Submission> {
        if input.is_empty() {
            return Ok(Submission::Ignored);
        }

        self.history.add(input);
        self.history.reset_pos();

        let command = input.trim();
        if command.eq_ignore_ascii_case(EXIT_COMMAND) {
            return Ok(Submission::Exit);
        }
        if command.eq_ignore_ascii_case(TERM_COMMAND) {
            self.interrupt();
            return Ok(Submission::Interrupted);
        }

        match self.channel.submit(input) {
            Ok(pending) => Ok(Submission::Started(pending)),
            Err(Error::Busy) => {
                debug!("Shell busy, ignoring '{}'", input);
                Ok(Submission::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    /// Interrupt the running shell command
    pub fn interrupt(&mut self) {
        self.channel.cancel();
    }

    /// Older history entry, if any
    pub fn history_prev(&mut self) -> Option<String> {
        self.history.prev().ok().map(str::to_string)
    }

    /// Newer history entry; an empty string after the most recent one
    pub fn history_next(&mut self) -> Option<String> {
        self.history.next().ok().map(str::to_string)
    }

    /// Most recent history entry starting with `prefix`
    pub fn suggest(&self, prefix: &str) -> Option<String> {
        self.history.last_match(prefix).ok().map(str::to_string)
    }

    /// Ask the shell for completions of `input`
    pub async fn complete(&mut self, input: &str) -> Result<Completion> {
        if input.is_empty() {
            return Ok(Completion::NoCandidates);
        }

        let mut candidates = match self.channel.complete(input).await {
            Ok(candidates) => candidates,
            Err(Error::Busy) => {
                debug!("Shell busy, skipping completion");
                return Ok(Completion::NoCandidates);
            }
            Err(e) => return Err(e),
        };

        Ok(match candidates.len() {
            0 => Completion::NoCandidates,
            1 => {
                let candidate = candidates.remove(0);
                Completion::Replaced(self.apply_candidate(input, &candidate))
            }
            _ => {
                let common = common_prefix(&candidates);
                Completion::Candidates { candidates, common }
            }
        })
    }

    /// Replace the last argument of `input` with `candidate`
    pub fn apply_candidate(&self, input: &str, candidate: &str) -> String {
        self.completer.replace_last_arg(input, candidate)
    }

    /// Styled spans for one line of shell output
    pub fn render(&self, line: &str) -> Vec<StyledSpan> {
        self.parser.parse(line)
    }

    /// Stop the shell and write history to disk
    pub async fn shutdown(&mut self) -> Result<()> {
        let stopped = self.channel.stop().await;
        let saved = self.history.save();
        if let Err(e) = &saved {
            error!("Failed to save history: {}", e);
        }
        stopped.and(saved)
    }
}
